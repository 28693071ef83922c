//! Content nodes and their closed kind set

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FRESHNESS_FLOOR, LINK_WEIGHT_MAX, SCORE_CEILING, SCORE_FLOOR};

/// The four content kinds that can carry resonance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Gate,
    PainPoint,
    Tool,
    Insight,
}

impl NodeKind {
    /// Namespace prefix used in node ids, e.g. `tool::breathing-reset`
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Gate => "gate",
            NodeKind::PainPoint => "pain-point",
            NodeKind::Tool => "tool",
            NodeKind::Insight => "insight",
        }
    }

    /// Baseline link weight for freshly built nodes of this kind
    pub fn baseline_link_weight(self) -> f64 {
        match self {
            NodeKind::Gate => 1.0,
            NodeKind::PainPoint => 0.8,
            NodeKind::Tool => 0.9,
            NodeKind::Insight => 0.7,
        }
    }

    /// Deterministic node id for a slug of this kind
    pub fn node_id(self, slug: &str) -> String {
        format!("{}::{}", self.prefix(), slug)
    }
}

/// A content node in the resonance graph
///
/// Scores live in `[0.5, 10.0]`, decay in `[0, 0.5]`, freshness in
/// `[0.2, 1.0]`, link weight in `[0, 2.0]`. After every decay pass
/// `freshness == clamp(1 - decay, 0.2, 1.0)`; a signal application may
/// raise freshness ahead of that identity until the next pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub title: String,
    /// Parent grouping id (the owning gate for pain points and tools)
    pub cluster: String,
    pub resonance_score: f64,
    pub decay: f64,
    pub freshness: f64,
    pub link_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signal_at: Option<DateTime<Utc>>,
    /// Provenance tag naming the structural source this node came from
    pub source: String,
}

impl Node {
    /// Build a node at its kind baseline
    pub fn new(kind: NodeKind, slug: &str, title: &str, cluster: &str, source: &str) -> Self {
        Self {
            id: kind.node_id(slug),
            kind,
            title: title.to_string(),
            cluster: cluster.to_string(),
            resonance_score: 1.0,
            decay: 0.0,
            freshness: 1.0,
            link_weight: kind.baseline_link_weight(),
            last_signal_at: None,
            source: source.to_string(),
        }
    }

    /// Check the range and freshness identities that hold after a decay pass
    pub fn invariants_hold(&self) -> bool {
        let freshness_identity = (1.0 - self.decay).clamp(FRESHNESS_FLOOR, 1.0);
        self.resonance_score >= SCORE_FLOOR
            && self.resonance_score <= SCORE_CEILING
            && (0.0..=0.5).contains(&self.decay)
            && (self.freshness - freshness_identity).abs() < 1e-9
            && (0.0..=LINK_WEIGHT_MAX).contains(&self.link_weight)
    }
}
