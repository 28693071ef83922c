//! Engine configuration
//!
//! Loaded from a TOML file when one is given; every section falls back to
//! defaults, and an unreadable file degrades to the full default config
//! with a warning rather than aborting the run.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use reso_core::IngestConfig;

/// Memory and chunking bounds for the batch engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Soft ceiling; crossing it triggers backpressure, not failure
    pub max_memory_mb: f64,
    /// Initial events per chunk
    pub batch_size: usize,
    /// Backpressure halving never goes below this
    pub min_batch_size: usize,
    /// Hard-kill threshold, materially above the soft ceiling; crossing
    /// it aborts the run
    pub hard_kill_mb: f64,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 45.0,
            batch_size: 1000,
            min_batch_size: 32,
            hard_kill_mb: 256.0,
        }
    }
}

/// Thresholds for the drafts proposal artifact
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DraftsConfig {
    /// Propose a link adjustment once weight drifts this far from the
    /// kind baseline
    pub link_adjustment_threshold: f64,
    /// Propose expansion for unlinked nodes at or above this resonance
    pub expansion_resonance_threshold: f64,
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            link_adjustment_threshold: 0.25,
            expansion_resonance_threshold: 2.0,
        }
    }
}

/// Output artifact naming and rounding
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub registry_file: String,
    pub drafts_file: String,
    /// Decimal places for scores on the wire
    pub score_decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            registry_file: "resonance-registry.json".to_string(),
            drafts_file: "resonance-drafts.json".to_string(),
            score_decimals: 4,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub batching: BatchingConfig,
    pub ingest: IngestConfig,
    pub drafts: DraftsConfig,
    pub output: OutputConfig,
}

impl EngineConfig {
    /// Load from a TOML file, degrading to defaults on any failure
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("config '{}' unreadable ({}), using defaults", path.display(), err);
                return Self::default();
            }
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("config '{}' malformed ({}), using defaults", path.display(), err);
                Self::default()
            }
        }
    }
}
