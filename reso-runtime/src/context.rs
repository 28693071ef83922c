//! Per-run context
//!
//! One `RunContext` is constructed at the start of a run, threaded
//! through every stage, and discarded afterward. Nothing in the engine
//! keeps state across runs; a new run rebuilds everything from the
//! structural sources.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::EngineConfig;

pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: EngineConfig,
    warnings: Vec<String>,
}

impl RunContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            warnings: Vec::new(),
        }
    }

    /// Record a degraded-but-continuing condition
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_independent() {
        let a = RunContext::new(EngineConfig::default());
        let b = RunContext::new(EngineConfig::default());
        assert_ne!(a.run_id, b.run_id);
        assert!(a.warnings().is_empty());
    }

    #[test]
    fn test_warnings_accumulate() {
        let mut ctx = RunContext::new(EngineConfig::default());
        ctx.warn("gates.json missing");
        ctx.warn("analytics malformed");
        assert_eq!(ctx.warnings().len(), 2);
    }
}
