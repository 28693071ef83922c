//! Resonance scoring - the sole mutation path for node weights
//!
//! Both `apply_signal` and `decay_pass` mutate nodes in place. Callers
//! that need a pre-mutation snapshot must clone the registry first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    NodeRegistry, Node, Signal, DECAY_MAX, DECAY_MAX_COLD, DECAY_STEP, FRESHNESS_FLOOR,
    LINK_WEIGHT_MAX, SCORE_CEILING, SCORE_FLOOR,
};

/// Counts from one decay pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayReport {
    /// Nodes that have never received a signal (flat per-pass decrement)
    pub cold: usize,
    /// Nodes decayed in proportion to their age since the last signal
    pub aged: usize,
    /// Nodes sitting at the score floor after the pass
    pub floored: usize,
}

/// Applies signals and periodic decay to the node set
#[derive(Debug, Clone)]
pub struct ResonanceScorer {
    ceiling: f64,
}

impl Default for ResonanceScorer {
    fn default() -> Self {
        Self { ceiling: SCORE_CEILING }
    }
}

impl ResonanceScorer {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Composite boost for a signal:
    /// `min(ctr, 0.25)·4 + min(dwell/60, 5)·0.3 + min(depth, 5)·0.15`
    pub fn boost_for(signal: &Signal) -> f64 {
        signal.ctr.min(0.25) * 4.0
            + (signal.dwell_seconds / 60.0).min(5.0) * 0.3
            + signal.navigation_depth.min(5.0) * 0.15
    }

    /// Reinforce a node from one validated signal (mutates the node)
    pub fn apply_signal(&self, node: &mut Node, signal: &Signal) {
        let boost = Self::boost_for(signal);
        node.resonance_score = (node.resonance_score + boost).min(self.ceiling);
        node.link_weight = (node.link_weight + boost * 0.1).min(LINK_WEIGHT_MAX);
        node.freshness = (node.freshness + 0.1).min(1.0);
        node.last_signal_at = Some(signal.timestamp);
    }

    /// Run one decay pass over every node (mutates the registry)
    ///
    /// Two regimes, preserved as observed in production telemetry runs:
    /// never-signalled nodes take a flat 0.05 decrement per pass with decay
    /// capped at 0.3; signalled nodes decay in proportion to days since
    /// their last signal, capped at 0.5. Both branches re-establish
    /// `freshness = clamp(1 - decay, 0.2, 1.0)`.
    pub fn decay_pass(&self, registry: &mut NodeRegistry, now: DateTime<Utc>) -> DecayReport {
        let mut report = DecayReport::default();
        for node in registry.iter_mut() {
            match node.last_signal_at {
                None => {
                    node.decay = (node.decay + DECAY_STEP).min(DECAY_MAX_COLD);
                    node.resonance_score = (node.resonance_score - DECAY_STEP).max(SCORE_FLOOR);
                    report.cold += 1;
                }
                Some(last) => {
                    let age_days = ((now - last).num_seconds() as f64 / 86_400.0).max(0.0);
                    node.decay = (age_days * 0.01).min(DECAY_MAX);
                    node.resonance_score = (node.resonance_score - node.decay).max(SCORE_FLOOR);
                    report.aged += 1;
                }
            }
            node.freshness = (1.0 - node.decay).clamp(FRESHNESS_FLOOR, 1.0);
            if node.resonance_score <= SCORE_FLOOR {
                report.floored += 1;
            }
        }
        report
    }
}
