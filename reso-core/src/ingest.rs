//! Signal ingestion - heterogeneous telemetry into one event shape
//!
//! Three raw shapes are accepted:
//! - batch-array files `{"signals": [...]}`
//! - newline-delimited event records (one JSON object per line)
//! - aggregate analytics rows `{path, impressions, clicks, ctr, avgEngagementTime, timestamp}`
//!
//! Every record is validated before it may touch a live score; poisoned
//! records are isolated and counted, never applied.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{NodeKind, RawSignalRecord, Signal, SignalFault};

static GATE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/gates/([a-z0-9][a-z0-9-]*)/?$").unwrap());

static PAIN_POINT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/pain-points/([a-z0-9][a-z0-9-]*)/?$").unwrap());

static TOOL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/tools/([a-z0-9][a-z0-9-]*)/?$").unwrap());

static INSIGHT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/insights/([a-z0-9][a-z0-9-]*)/?$").unwrap());

/// Resolve a site path to a namespaced node id
pub fn resolve_path(path: &str) -> Option<String> {
    let route: [(&LazyLock<Regex>, NodeKind); 4] = [
        (&GATE_PATH, NodeKind::Gate),
        (&PAIN_POINT_PATH, NodeKind::PainPoint),
        (&TOOL_PATH, NodeKind::Tool),
        (&INSIGHT_PATH, NodeKind::Insight),
    ];
    for (pattern, kind) in route {
        if let Some(captures) = pattern.captures(path) {
            return Some(kind.node_id(&captures[1]));
        }
    }
    None
}

/// One row of the aggregate analytics export
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsRow {
    pub path: Option<String>,
    pub impressions: Option<f64>,
    pub clicks: Option<f64>,
    pub ctr: Option<f64>,
    pub avg_engagement_time: Option<f64>,
    pub timestamp: Option<crate::RawTimestamp>,
}

/// Top-level shape of the aggregate analytics file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsFile {
    #[serde(default)]
    pub rows: Vec<AnalyticsRow>,
}

/// Top-level shape of the batch-array signal file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalBatchFile {
    #[serde(default)]
    pub signals: Vec<RawSignalRecord>,
}

impl From<AnalyticsRow> for RawSignalRecord {
    fn from(row: AnalyticsRow) -> Self {
        RawSignalRecord {
            path: row.path,
            impressions: row.impressions,
            clicks: row.clicks,
            ctr: row.ctr,
            dwell_seconds: row.avg_engagement_time,
            timestamp: row.timestamp,
            ..RawSignalRecord::default()
        }
    }
}

/// Validation bounds for incoming telemetry
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Timestamps further in the future than this are poison
    pub future_tolerance_hours: i64,
    /// Absolute cap on any metric magnitude
    pub magnitude_cap: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            future_tolerance_hours: 24,
            magnitude_cap: 1e10,
        }
    }
}

/// Running tallies for one ingestion pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Records that produced a valid signal
    pub accepted: usize,
    /// Poisoned records kept away from the graph
    pub isolated: usize,
    /// Records whose path matched no known route (not poison)
    pub unresolved: usize,
    /// Records identical to an already-accepted event
    pub duplicates: usize,
}

/// Normalizes raw telemetry records into validated signals
///
/// The dedup window is bounded; when the batch engine signals memory
/// pressure, `relieve` drops the window first.
pub struct SignalIngestor {
    config: IngestConfig,
    now: DateTime<Utc>,
    epoch_floor: DateTime<Utc>,
    seen: HashSet<String>,
    stats: IngestStats,
}

impl SignalIngestor {
    /// Upper bound on the dedup window before it is recycled
    const DEDUP_WINDOW_MAX: usize = 100_000;

    pub fn new(config: IngestConfig, now: DateTime<Utc>) -> Self {
        // Telemetry predating the platform is as impossible as the future
        let epoch_floor = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        Self {
            config,
            now,
            epoch_floor,
            seen: HashSet::new(),
            stats: IngestStats::default(),
        }
    }

    /// Normalize one record, updating the tallies
    ///
    /// Returns `None` for poisoned, unresolved, or duplicate records.
    pub fn ingest_record(&mut self, record: &RawSignalRecord) -> Option<Signal> {
        match self.normalize(record) {
            Ok(signal) => {
                if self.seen.len() >= Self::DEDUP_WINDOW_MAX {
                    self.seen.clear();
                }
                if !self.seen.insert(signal.dedup_hash.clone()) {
                    self.stats.duplicates += 1;
                    return None;
                }
                self.stats.accepted += 1;
                Some(signal)
            }
            Err(SignalFault::UnresolvedPath { path }) => {
                self.stats.unresolved += 1;
                debug!("unresolved signal path: {}", path);
                None
            }
            Err(fault) => {
                self.stats.isolated += 1;
                warn!("isolated poisoned signal: {}", fault);
                None
            }
        }
    }

    /// Normalize a whole batch, returning only the valid signals
    pub fn ingest_batch(&mut self, records: &[RawSignalRecord]) -> Vec<Signal> {
        records
            .iter()
            .filter_map(|record| self.ingest_record(record))
            .collect()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Drop the dedup window; called by the batch engine under memory pressure
    pub fn relieve(&mut self) {
        self.seen.clear();
        self.seen.shrink_to_fit();
    }

    fn normalize(&self, record: &RawSignalRecord) -> Result<Signal, SignalFault> {
        let node_id = match (&record.node_id, &record.path) {
            (Some(id), _) if !id.is_empty() => id.clone(),
            (_, Some(path)) => resolve_path(path).ok_or_else(|| SignalFault::UnresolvedPath {
                path: path.clone(),
            })?,
            _ => return Err(SignalFault::MissingTarget),
        };

        let impressions = self.checked_metric(record.impressions, "impressions")?;
        let clicks = self.checked_metric(record.clicks, "clicks")?;
        let dwell_seconds = self.checked_metric(record.dwell_seconds, "dwellSeconds")?;
        let navigation_depth = self.checked_metric(record.navigation_depth, "navigationDepth")?;

        let ctr = match record.ctr {
            Some(ctr) if !ctr.is_finite() => return Err(SignalFault::NonFinite { field: "ctr" }),
            Some(ctr) => ctr,
            None if impressions > 0.0 => clicks / impressions,
            None => 0.0,
        };
        if !(0.0..=1.0).contains(&ctr) {
            return Err(SignalFault::CtrOutOfRange { ctr });
        }

        let timestamp = match &record.timestamp {
            Some(raw) => {
                let at = raw.to_datetime().ok_or(SignalFault::MalformedTimestamp)?;
                let horizon = self.now + chrono::Duration::hours(self.config.future_tolerance_hours);
                if at > horizon {
                    return Err(SignalFault::TimestampOutOfRange {
                        detail: format!("{} is in the future", at.to_rfc3339()),
                    });
                }
                if at < self.epoch_floor {
                    return Err(SignalFault::TimestampOutOfRange {
                        detail: format!("{} predates the epoch floor", at.to_rfc3339()),
                    });
                }
                at
            }
            None => self.now,
        };

        if let Some(target) = &record.link_target {
            if *target == node_id {
                return Err(SignalFault::SelfReferential { node_id });
            }
        }

        let dedup_hash = Signal::compute_dedup_hash(
            &node_id,
            timestamp,
            impressions,
            clicks,
            dwell_seconds,
            navigation_depth,
        );

        Ok(Signal {
            node_id,
            path: record.path.clone(),
            impressions,
            clicks,
            ctr,
            dwell_seconds,
            navigation_depth,
            timestamp,
            dedup_hash,
        })
    }

    fn checked_metric(
        &self,
        value: Option<f64>,
        field: &'static str,
    ) -> Result<f64, SignalFault> {
        let Some(value) = value else {
            return Ok(0.0);
        };
        if !value.is_finite() {
            return Err(SignalFault::NonFinite { field });
        }
        if value < 0.0 {
            return Err(SignalFault::NegativeValue { field });
        }
        if value > self.config.magnitude_cap {
            return Err(SignalFault::MagnitudeOutOfRange { field, value });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> SignalIngestor {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        SignalIngestor::new(IngestConfig::default(), now)
    }

    fn record(path: &str) -> RawSignalRecord {
        RawSignalRecord {
            path: Some(path.to_string()),
            impressions: Some(100.0),
            clicks: Some(20.0),
            dwell_seconds: Some(120.0),
            ..RawSignalRecord::default()
        }
    }

    #[test]
    fn test_path_resolution() {
        assert_eq!(resolve_path("/tools/b").as_deref(), Some("tool::b"));
        assert_eq!(
            resolve_path("/pain-points/racing-mind/").as_deref(),
            Some("pain-point::racing-mind")
        );
        assert_eq!(resolve_path("/gates/sleep").as_deref(), Some("gate::sleep"));
        assert_eq!(resolve_path("/insights/small-wins").as_deref(), Some("insight::small-wins"));
        assert!(resolve_path("/admin/login").is_none());
        assert!(resolve_path("/tools/").is_none());
    }

    #[test]
    fn test_ctr_derived_from_counts() {
        let mut ingestor = ingestor();
        let signal = ingestor.ingest_record(&record("/tools/b")).unwrap();
        assert_eq!(signal.node_id, "tool::b");
        assert!((signal.ctr - 0.2).abs() < 1e-12);
        assert_eq!(ingestor.stats().accepted, 1);
    }

    #[test]
    fn test_analytics_row_normalizes_engagement_time() {
        let mut ingestor = ingestor();
        let row: AnalyticsRow = serde_json::from_str(
            r#"{"path":"/gates/sleep","impressions":40,"clicks":4,"avgEngagementTime":90.5}"#,
        )
        .unwrap();
        let signal = ingestor.ingest_record(&row.into()).unwrap();
        assert_eq!(signal.node_id, "gate::sleep");
        assert!((signal.dwell_seconds - 90.5).abs() < 1e-12);
    }

    #[test]
    fn test_poison_isolation() {
        let mut ingestor = ingestor();

        let poisoned = vec![
            RawSignalRecord {
                impressions: Some(f64::NAN),
                ..record("/tools/b")
            },
            RawSignalRecord {
                clicks: Some(-5.0),
                ..record("/tools/b")
            },
            RawSignalRecord {
                ctr: Some(4.2),
                ..record("/tools/b")
            },
            RawSignalRecord {
                dwell_seconds: Some(3.0e12),
                ..record("/tools/b")
            },
            RawSignalRecord {
                // Centuries out
                timestamp: Some(crate::RawTimestamp::Text("2525-01-01T00:00:00Z".into())),
                ..record("/tools/b")
            },
            RawSignalRecord {
                timestamp: Some(crate::RawTimestamp::Text("not-a-time".into())),
                ..record("/tools/b")
            },
            RawSignalRecord {
                node_id: Some("tool::b".into()),
                link_target: Some("tool::b".into()),
                ..record("/tools/b")
            },
            RawSignalRecord::default(),
        ];

        for record in &poisoned {
            assert!(ingestor.ingest_record(record).is_none());
        }
        assert_eq!(ingestor.stats().isolated, poisoned.len());
        assert_eq!(ingestor.stats().accepted, 0);
    }

    #[test]
    fn test_unresolved_path_is_not_poison() {
        let mut ingestor = ingestor();
        assert!(ingestor.ingest_record(&record("/press/launch")).is_none());
        assert_eq!(ingestor.stats().unresolved, 1);
        assert_eq!(ingestor.stats().isolated, 0);
    }

    #[test]
    fn test_duplicate_records_collapse() {
        let mut ingestor = ingestor();
        let record = RawSignalRecord {
            timestamp: Some(crate::RawTimestamp::Epoch(1_748_000_000.0)),
            ..record("/tools/b")
        };
        assert!(ingestor.ingest_record(&record).is_some());
        assert!(ingestor.ingest_record(&record).is_none());
        assert_eq!(ingestor.stats().duplicates, 1);
        assert_eq!(ingestor.stats().accepted, 1);
    }
}
