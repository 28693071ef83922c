//! Usage signals and their validation
//!
//! Signals are transient telemetry events:
//! - Normalized from heterogeneous sources into one shape
//! - Validated before they may touch a live score
//! - Consumed once, never stored verbatim on a node

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Why a raw record was kept away from the live graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalFault {
    #[error("non-finite value in field '{field}'")]
    NonFinite { field: &'static str },

    #[error("negative value in field '{field}'")]
    NegativeValue { field: &'static str },

    #[error("ctr {ctr} outside [0, 1]")]
    CtrOutOfRange { ctr: f64 },

    #[error("field '{field}' magnitude {value} exceeds cap")]
    MagnitudeOutOfRange { field: &'static str, value: f64 },

    #[error("timestamp could not be parsed")]
    MalformedTimestamp,

    #[error("timestamp out of the accepted window: {detail}")]
    TimestampOutOfRange { detail: String },

    #[error("self-referential link target on {node_id}")]
    SelfReferential { node_id: String },

    #[error("record carries neither a node id nor a path")]
    MissingTarget,

    #[error("path '{path}' does not resolve to a node")]
    UnresolvedPath { path: String },
}

/// Timestamps arrive either as epoch numbers or as RFC 3339 text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

impl RawTimestamp {
    /// Epoch values at or above this are interpreted as milliseconds
    const MILLIS_CUTOVER: f64 = 1e11;

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Epoch(v) => {
                if !v.is_finite() {
                    return None;
                }
                if v.abs() >= Self::MILLIS_CUTOVER {
                    Utc.timestamp_millis_opt(*v as i64).single()
                } else {
                    Utc.timestamp_opt(*v as i64, 0).single()
                }
            }
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// One raw telemetry record, before validation and normalization
///
/// All fields are optional: the three source shapes populate different
/// subsets, and absence is not a fault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSignalRecord {
    pub path: Option<String>,
    pub node_id: Option<String>,
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub ctr: Option<f64>,
    pub dwell_seconds: Option<f64>,
    pub navigation_depth: Option<f64>,
    /// Target of a recommendation click, when the event carries one
    pub link_target: Option<String>,
    pub timestamp: Option<RawTimestamp>,
}

/// A validated, normalized usage signal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub node_id: String,
    pub path: Option<String>,
    pub impressions: f64,
    pub clicks: f64,
    pub ctr: f64,
    pub dwell_seconds: f64,
    pub navigation_depth: f64,
    pub timestamp: DateTime<Utc>,
    /// Content hash for dedup across overlapping sources
    pub dedup_hash: String,
}

impl Signal {
    /// Sixteen-hex-digit content hash over the fields that identify an event
    pub fn compute_dedup_hash(
        node_id: &str,
        timestamp: DateTime<Utc>,
        impressions: f64,
        clicks: f64,
        dwell_seconds: f64,
        navigation_depth: f64,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(node_id.as_bytes());
        hasher.update(timestamp.timestamp_millis().to_le_bytes());
        for value in [impressions, clicks, dwell_seconds, navigation_depth] {
            hasher.update(value.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}
