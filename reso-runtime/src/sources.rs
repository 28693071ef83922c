//! File loaders for the structural, signal, and edge inputs
//!
//! Every loader degrades: a missing or malformed file contributes
//! nothing, logs why, and lets the run continue. NDJSON is parsed per
//! line so one broken line drops only itself.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use reso_core::{
    AnalyticsFile, GateCollection, InsightCollection, PainPointCollection, RawSignalRecord,
    SignalBatchFile, ToolCollection,
};
use reso_graph::EdgeFile;

use crate::RunContext;

/// Read and parse a JSON file; `None` means the source contributes nothing
pub fn load_json<T: DeserializeOwned>(
    ctx: &mut RunContext,
    path: &Path,
    what: &str,
) -> Option<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            ctx.warn(format!("{} '{}' unreadable: {}", what, path.display(), err));
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            ctx.warn(format!("{} '{}' malformed: {}", what, path.display(), err));
            None
        }
    }
}

pub fn load_gates(ctx: &mut RunContext, path: &Path) -> Option<GateCollection> {
    load_json(ctx, path, "gate collection")
}

pub fn load_pain_points(ctx: &mut RunContext, path: &Path) -> Option<PainPointCollection> {
    load_json(ctx, path, "pain-point collection")
}

pub fn load_tools(ctx: &mut RunContext, path: &Path) -> Option<ToolCollection> {
    load_json(ctx, path, "tool collection")
}

pub fn load_insights(ctx: &mut RunContext, path: &Path) -> Option<InsightCollection> {
    load_json(ctx, path, "insight collection")
}

/// Edge list; missing or malformed degrades to no edges
pub fn load_edges(ctx: &mut RunContext, path: &Path) -> EdgeFile {
    load_json(ctx, path, "edge file").unwrap_or_default()
}

/// Batch-array signal file `{"signals": [...]}`
pub fn load_signal_batch(ctx: &mut RunContext, path: &Path) -> Vec<RawSignalRecord> {
    load_json::<SignalBatchFile>(ctx, path, "signal batch")
        .map(|file| file.signals)
        .unwrap_or_default()
}

/// Newline-delimited event records, one JSON object per line
pub fn load_ndjson_events(ctx: &mut RunContext, path: &Path) -> Vec<RawSignalRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            ctx.warn(format!("event file '{}' unreadable: {}", path.display(), err));
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    let mut broken = 0usize;
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawSignalRecord>(line) {
            Ok(record) => records.push(record),
            Err(_) => broken += 1,
        }
    }
    if broken > 0 {
        ctx.warn(format!(
            "event file '{}': dropped {} unparseable lines",
            path.display(),
            broken
        ));
    }
    debug!("loaded {} event records from {}", records.len(), path.display());
    records
}

/// Aggregate analytics rows, converted to the common raw shape
pub fn load_analytics(ctx: &mut RunContext, path: &Path) -> Vec<RawSignalRecord> {
    load_json::<AnalyticsFile>(ctx, path, "analytics file")
        .map(|file| file.rows.into_iter().map(Into::into).collect())
        .unwrap_or_default()
}
