//! Resograph Runtime - per-run orchestration
//!
//! Drives one full scoring run over the local file interfaces:
//! - Explicit per-run context in place of process-wide state
//! - TOML configuration with defaults-first degradation
//! - File loaders that degrade to empty contributions, never abort
//! - The memory-capped, pull-based event batch engine
//! - Output artifacts: the scored registry and the drafts proposal file

pub mod config;
pub mod context;
pub mod sources;
pub mod batching;
pub mod drafts;
pub mod pipeline;
pub mod synthetic;

pub use config::*;
pub use context::*;
pub use sources::*;
pub use batching::*;
pub use drafts::*;
pub use pipeline::*;
pub use synthetic::*;
