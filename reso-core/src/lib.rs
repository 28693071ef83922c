//! Resograph Core - node, signal, and scoring model for the resonance graph
//!
//! This crate provides the foundational primitives:
//! - Content nodes with resonance scores, decay, and freshness
//! - Usage signals normalized from heterogeneous telemetry sources
//! - Poison isolation that keeps malformed telemetry away from live scores
//! - The registry builder that assembles the node set once per run
//! - The scorer, which is the sole mutation path for node weights

pub mod node;
pub mod signal;
pub mod ingest;
pub mod registry;
pub mod scorer;

pub use node::*;
pub use signal::*;
pub use ingest::*;
pub use registry::*;
pub use scorer::*;

/// Lowest resonance score a node can decay to
pub const SCORE_FLOOR: f64 = 0.5;

/// Hard ceiling on resonance score; signal floods saturate here
pub const SCORE_CEILING: f64 = 10.0;

/// Maximum decay for a node that has received at least one signal
pub const DECAY_MAX: f64 = 0.5;

/// Maximum decay for a node that has never received a signal
pub const DECAY_MAX_COLD: f64 = 0.3;

/// Flat per-pass decay step for never-signalled nodes
pub const DECAY_STEP: f64 = 0.05;

/// Lowest freshness a node can reach
pub const FRESHNESS_FLOOR: f64 = 0.2;

/// Hard ceiling on link weight
pub const LINK_WEIGHT_MAX: f64 = 2.0;
