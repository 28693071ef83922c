//! Resograph Graph - structure over the node set
//!
//! This crate owns everything derived from the recommendation edge list:
//! - Outbound/inbound adjacency indices, built once per run
//! - Blackout rerouting over the precomputed indices
//! - Propagation stability checks for densely-connected clusters
//!
//! Nothing here mutates the node registry; engines consume `(nodes,
//! adjacency)` as an immutable snapshot and return derived reports.

pub mod connection;
pub mod routes;
pub mod convergence;

pub use connection::*;
pub use routes::*;
pub use convergence::*;
