//! Drafts artifact - proposals, never applied
//!
//! The drafts file is the governance boundary between this engine and the
//! structural sources: it records what the scored run *suggests* changing
//! (link-weight adjustments, expansion candidates), and an editor applies
//! or rejects those suggestions upstream. Nothing in this workspace
//! writes back into structural inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reso_core::{round_to, NodeRegistry};
use reso_graph::ConnectionGraph;

use crate::DraftsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAdjustment {
    pub node_id: String,
    pub cluster: String,
    /// The kind baseline the weight drifted from
    pub baseline_weight: f64,
    pub proposed_weight: f64,
    pub drift: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionCandidate {
    pub node_id: String,
    pub cluster: String,
    pub resonance_score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftsArtifact {
    pub generated: DateTime<Utc>,
    /// Always "draft"; consumers must treat every entry as a proposal
    pub status: String,
    pub link_adjustments: Vec<LinkAdjustment>,
    pub expansion_candidates: Vec<ExpansionCandidate>,
}

/// Derive draft proposals from a scored registry and its adjacency
pub fn derive_drafts(
    registry: &NodeRegistry,
    graph: &ConnectionGraph,
    config: &DraftsConfig,
    generated: DateTime<Utc>,
) -> DraftsArtifact {
    let mut link_adjustments = Vec::new();
    let mut expansion_candidates = Vec::new();

    for node in registry.iter() {
        let baseline = node.kind.baseline_link_weight();
        let drift = node.link_weight - baseline;
        if drift.abs() >= config.link_adjustment_threshold {
            link_adjustments.push(LinkAdjustment {
                node_id: node.id.clone(),
                cluster: node.cluster.clone(),
                baseline_weight: baseline,
                proposed_weight: round_to(node.link_weight, 4),
                drift: round_to(drift, 4),
                reason: if drift > 0.0 {
                    "sustained usage signal lifted weight above baseline".to_string()
                } else {
                    "weight fell below baseline under decay".to_string()
                },
            });
        }

        if node.resonance_score >= config.expansion_resonance_threshold
            && graph.outbound(&node.id).is_empty()
        {
            expansion_candidates.push(ExpansionCandidate {
                node_id: node.id.clone(),
                cluster: node.cluster.clone(),
                resonance_score: round_to(node.resonance_score, 4),
                reason: "high resonance with no outbound recommendations".to_string(),
            });
        }
    }

    DraftsArtifact {
        generated,
        status: "draft".to_string(),
        link_adjustments,
        expansion_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reso_core::{Node, NodeKind};
    use reso_graph::RecommendationEdge;

    fn scored_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();

        let mut hot = Node::new(NodeKind::Tool, "b", "B", "sleep", "tools");
        hot.resonance_score = 3.1;
        hot.link_weight = 1.3;
        registry.insert(hot);

        let mut linked = Node::new(NodeKind::Tool, "c", "C", "sleep", "tools");
        linked.resonance_score = 2.5;
        registry.insert(linked);

        registry.insert(Node::new(NodeKind::Gate, "sleep", "Sleep", "sleep", "gates"));
        registry
    }

    fn graph() -> ConnectionGraph {
        let edges = vec![RecommendationEdge {
            from: "tool::c".to_string(),
            to: vec!["gate::sleep".to_string()],
            cluster: "sleep".to_string(),
            reason: String::new(),
            status: "active".to_string(),
        }];
        ConnectionGraph::build(&edges, |_| true)
    }

    #[test]
    fn test_drift_past_threshold_proposes_adjustment() {
        let drafts = derive_drafts(
            &scored_registry(),
            &graph(),
            &DraftsConfig::default(),
            Utc::now(),
        );

        assert_eq!(drafts.status, "draft");
        assert_eq!(drafts.link_adjustments.len(), 1);
        let adjustment = &drafts.link_adjustments[0];
        assert_eq!(adjustment.node_id, "tool::b");
        assert_eq!(adjustment.baseline_weight, 0.9);
        assert_eq!(adjustment.proposed_weight, 1.3);
    }

    #[test]
    fn test_unlinked_hot_nodes_become_expansion_candidates() {
        let drafts = derive_drafts(
            &scored_registry(),
            &graph(),
            &DraftsConfig::default(),
            Utc::now(),
        );

        // tool::b is hot and has no outbound edges; tool::c is hot but linked
        let ids: Vec<&str> = drafts
            .expansion_candidates
            .iter()
            .map(|c| c.node_id.as_str())
            .collect();
        assert!(ids.contains(&"tool::b"));
        assert!(!ids.contains(&"tool::c"));
        assert!(!ids.contains(&"gate::sleep"));
    }

    #[test]
    fn test_round_trips_as_json() {
        let drafts = derive_drafts(
            &scored_registry(),
            &graph(),
            &DraftsConfig::default(),
            Utc::now(),
        );
        let json = serde_json::to_string_pretty(&drafts).unwrap();
        assert!(json.contains("\"status\": \"draft\""));
        let reloaded: DraftsArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.link_adjustments.len(), drafts.link_adjustments.len());
    }
}
