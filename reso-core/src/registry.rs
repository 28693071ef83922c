//! Node registry construction from structural sources
//!
//! The registry is built once per run from the four structural
//! collections. Missing collections degrade to an empty contribution with
//! a warning; malformed entries are skipped and counted, never fatal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Node, NodeKind};

/// `{"gates": [{id, title}]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateCollection {
    #[serde(default)]
    pub gates: Vec<StructuralEntry>,
}

/// `{"painPoints": {"<gateId>": [{id, title}]}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PainPointCollection {
    #[serde(default)]
    pub pain_points: HashMap<String, Vec<StructuralEntry>>,
}

/// `{"tools": [{id, slug, title, gateIds, ...}]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCollection {
    #[serde(default)]
    pub tools: Vec<ToolEntry>,
}

/// `{"insights": [{slug, title}]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightCollection {
    #[serde(default)]
    pub insights: Vec<InsightEntry>,
}

/// Common `{id, title}` shape used by gates and pain points
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StructuralEntry {
    pub id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolEntry {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub gate_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InsightEntry {
    pub slug: Option<String>,
    pub title: Option<String>,
}

/// Insertion-ordered node set with id lookup
///
/// Nodes are created once per run and then mutated in place by the scorer;
/// nothing is deleted mid-run.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index for nodes loaded from a serialized registry
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut registry = Self::new();
        for node in nodes {
            registry.insert(node);
        }
        registry
    }

    /// Insert a node; returns false (and drops the node) on a duplicate id
    pub fn insert(&mut self, node: Node) -> bool {
        if self.index.contains_key(&node.id) {
            return false;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).copied().map(|i| &mut self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Counts from one registry build
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub built: usize,
    /// Malformed entries dropped (missing id/slug or title)
    pub skipped: usize,
    /// Duplicate ids dropped after the first occurrence
    pub duplicates: usize,
    pub missing_sources: Vec<&'static str>,
}

/// Builds the node set and baseline weights from structural sources
///
/// Collections are handed in as `Option`s; `None` means the source file
/// was absent or unreadable and contributes nothing.
#[derive(Debug, Default)]
pub struct NodeRegistryBuilder {
    gates: Option<GateCollection>,
    pain_points: Option<PainPointCollection>,
    tools: Option<ToolCollection>,
    insights: Option<InsightCollection>,
}

impl NodeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gates(mut self, collection: Option<GateCollection>) -> Self {
        self.gates = collection;
        self
    }

    pub fn pain_points(mut self, collection: Option<PainPointCollection>) -> Self {
        self.pain_points = collection;
        self
    }

    pub fn tools(mut self, collection: Option<ToolCollection>) -> Self {
        self.tools = collection;
        self
    }

    pub fn insights(mut self, collection: Option<InsightCollection>) -> Self {
        self.insights = collection;
        self
    }

    pub fn build(self) -> (NodeRegistry, BuildReport) {
        let mut registry = NodeRegistry::new();
        let mut report = BuildReport::default();

        match self.gates {
            Some(collection) => {
                for entry in &collection.gates {
                    let (Some(id), Some(title)) = (&entry.id, &entry.title) else {
                        report.skipped += 1;
                        continue;
                    };
                    // Gates head their own cluster
                    let node = Node::new(NodeKind::Gate, id, title, id, "gates");
                    Self::admit(&mut registry, &mut report, node);
                }
            }
            None => Self::missing(&mut report, "gates"),
        }

        match self.pain_points {
            Some(collection) => {
                let mut gate_ids: Vec<_> = collection.pain_points.keys().cloned().collect();
                gate_ids.sort();
                for gate_id in gate_ids {
                    for entry in &collection.pain_points[&gate_id] {
                        let (Some(id), Some(title)) = (&entry.id, &entry.title) else {
                            report.skipped += 1;
                            continue;
                        };
                        let node =
                            Node::new(NodeKind::PainPoint, id, title, &gate_id, "pain-points");
                        Self::admit(&mut registry, &mut report, node);
                    }
                }
            }
            None => Self::missing(&mut report, "pain-points"),
        }

        match self.tools {
            Some(collection) => {
                for entry in &collection.tools {
                    let slug = entry.slug.as_ref().or(entry.id.as_ref());
                    let (Some(slug), Some(title)) = (slug, &entry.title) else {
                        report.skipped += 1;
                        continue;
                    };
                    let cluster = entry.gate_ids.first().map(String::as_str).unwrap_or("");
                    let node = Node::new(NodeKind::Tool, slug, title, cluster, "tools");
                    Self::admit(&mut registry, &mut report, node);
                }
            }
            None => Self::missing(&mut report, "tools"),
        }

        match self.insights {
            Some(collection) => {
                for entry in &collection.insights {
                    let (Some(slug), Some(title)) = (&entry.slug, &entry.title) else {
                        report.skipped += 1;
                        continue;
                    };
                    let node = Node::new(NodeKind::Insight, slug, title, "insights", "insights");
                    Self::admit(&mut registry, &mut report, node);
                }
            }
            None => Self::missing(&mut report, "insights"),
        }

        report.built = registry.len();
        if report.skipped > 0 {
            warn!("skipped {} malformed structural entries", report.skipped);
        }
        (registry, report)
    }

    fn admit(registry: &mut NodeRegistry, report: &mut BuildReport, node: Node) {
        let id = node.id.clone();
        if !registry.insert(node) {
            report.duplicates += 1;
            warn!("duplicate node id dropped: {}", id);
        }
    }

    fn missing(report: &mut BuildReport, source: &'static str) {
        report.missing_sources.push(source);
        warn!("structural source '{}' missing, contributing nothing", source);
    }
}

/// The scored registry artifact written at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRegistry {
    pub version: String,
    pub generated: DateTime<Utc>,
    pub nodes: Vec<Node>,
}

impl ScoredRegistry {
    pub const VERSION: &'static str = "1";

    /// Snapshot a registry with scores rounded for the wire
    ///
    /// Rounding happens on write only; reloading the artifact reproduces
    /// the written values exactly.
    pub fn from_registry(registry: &NodeRegistry, generated: DateTime<Utc>, decimals: u32) -> Self {
        let nodes = registry
            .iter()
            .map(|node| {
                let mut node = node.clone();
                node.resonance_score = round_to(node.resonance_score, decimals);
                node.link_weight = round_to(node.link_weight, decimals);
                node.decay = round_to(node.decay, decimals);
                node.freshness = round_to(node.freshness, decimals);
                node
            })
            .collect();
        Self {
            version: Self::VERSION.to_string(),
            generated,
            nodes,
        }
    }
}

/// Round to a fixed number of decimals for output artifacts
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
