//! Recommendation edges and adjacency indices
//!
//! The graph is built once per run and shared by every engine that needs
//! it; rescanning the raw edge list per query is the performance defect
//! this module exists to prevent.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One entry of the recommendation edge file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationEdge {
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub status: String,
}

/// `{"recommendations": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeFile {
    #[serde(default)]
    pub recommendations: Vec<RecommendationEdge>,
}

/// Directed adjacency over node ids
///
/// Edges referencing unknown node ids are tolerated and excluded, as are
/// self references; cycles are legal. Both directions are indexed so that
/// referrer lookups are O(1), not edge scans.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    outbound: HashMap<String, Vec<String>>,
    inbound: HashMap<String, Vec<String>>,
    members: BTreeSet<String>,
    edge_count: usize,
}

impl ConnectionGraph {
    /// Build the indices once from the edge list
    ///
    /// `known_node` decides membership; anything it rejects is a dangling
    /// reference and is dropped from both indices.
    pub fn build<F>(edges: &[RecommendationEdge], known_node: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut graph = Self::default();
        let mut dangling = 0usize;
        let mut self_refs = 0usize;

        for edge in edges {
            if !known_node(&edge.from) {
                dangling += 1;
                continue;
            }
            let mut seen: HashSet<&str> = HashSet::new();
            for target in &edge.to {
                if target == &edge.from {
                    self_refs += 1;
                    continue;
                }
                if !known_node(target) {
                    dangling += 1;
                    continue;
                }
                if !seen.insert(target.as_str()) {
                    continue;
                }
                graph
                    .outbound
                    .entry(edge.from.clone())
                    .or_default()
                    .push(target.clone());
                graph
                    .inbound
                    .entry(target.clone())
                    .or_default()
                    .push(edge.from.clone());
                graph.members.insert(edge.from.clone());
                graph.members.insert(target.clone());
                graph.edge_count += 1;
            }
        }

        if dangling > 0 || self_refs > 0 {
            debug!(
                "edge build dropped {} dangling and {} self references",
                dangling, self_refs
            );
        }
        graph
    }

    pub fn outbound(&self, id: &str) -> &[String] {
        self.outbound.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn inbound(&self, id: &str) -> &[String] {
        self.inbound.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Inbound plus outbound degree, the structural-importance proxy
    pub fn centrality(&self, id: &str) -> usize {
        self.inbound(id).len() + self.outbound(id).len()
    }

    /// Count of neighbors connected in both directions
    pub fn bidirectional_degree(&self, id: &str) -> usize {
        self.outbound(id)
            .iter()
            .filter(|target| self.outbound(target).iter().any(|t| t == id))
            .count()
    }

    /// Deduplicated union of both directions
    pub fn undirected_neighbors(&self, id: &str) -> Vec<String> {
        let mut neighbors: BTreeSet<&String> = self.outbound(id).iter().collect();
        neighbors.extend(self.inbound(id));
        neighbors.into_iter().cloned().collect()
    }

    /// Ids present in the index, in deterministic order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.members.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// All ids ranked by centrality, descending, ties broken by id
    ///
    /// Computed from the prebuilt indices; used for top-K blackout
    /// selection.
    pub fn ranked_by_centrality(&self) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .members
            .iter()
            .map(|id| (id.clone(), self.centrality(id)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn edge(from: &str, to: &[&str]) -> RecommendationEdge {
        RecommendationEdge {
            from: from.to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
            cluster: String::new(),
            reason: String::new(),
            status: "active".to_string(),
        }
    }

    #[test]
    fn test_indices_built_once_from_edges() {
        let edges = vec![
            edge("tool::a", &["tool::b", "tool::c"]),
            edge("tool::b", &["tool::a"]),
        ];
        let graph = ConnectionGraph::build(&edges, |_| true);

        assert_eq!(graph.outbound("tool::a"), ["tool::b", "tool::c"]);
        assert_eq!(graph.inbound("tool::a"), ["tool::b"]);
        assert_eq!(graph.centrality("tool::a"), 3);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_dangling_and_self_references_excluded() {
        let edges = vec![
            edge("tool::a", &["tool::a", "tool::ghost", "tool::b"]),
            edge("tool::ghost", &["tool::b"]),
        ];
        let known = |id: &str| id != "tool::ghost";
        let graph = ConnectionGraph::build(&edges, known);

        assert_eq!(graph.outbound("tool::a"), ["tool::b"]);
        assert!(graph.outbound("tool::ghost").is_empty());
        assert_eq!(graph.centrality("tool::b"), 1);
    }

    #[test]
    fn test_duplicate_targets_dedupe() {
        let edges = vec![edge("tool::a", &["tool::b", "tool::b"])];
        let graph = ConnectionGraph::build(&edges, |_| true);
        assert_eq!(graph.outbound("tool::a"), ["tool::b"]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_bidirectional_degree() {
        let edges = vec![
            edge("tool::a", &["tool::b", "tool::c"]),
            edge("tool::b", &["tool::a"]),
            edge("tool::c", &["tool::b"]),
        ];
        let graph = ConnectionGraph::build(&edges, |_| true);
        assert_eq!(graph.bidirectional_degree("tool::a"), 1);
        assert_eq!(graph.bidirectional_degree("tool::c"), 0);
    }

    #[test]
    fn test_centrality_ranking_is_stable() {
        let edges = vec![
            edge("tool::a", &["tool::b"]),
            edge("tool::b", &["tool::a"]),
            edge("tool::c", &["tool::a"]),
        ];
        let graph = ConnectionGraph::build(&edges, |_| true);
        let ranked = graph.ranked_by_centrality();
        assert_eq!(ranked[0].0, "tool::a");
        assert_eq!(ranked[0].1, 3);
        assert_eq!(ranked[1], ("tool::b".to_string(), 2));
        assert_eq!(ranked[2], ("tool::c".to_string(), 1));
    }
}
