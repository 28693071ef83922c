//! Blackout rerouting over precomputed adjacency indices
//!
//! Simulates removal of high-importance nodes and checks that every
//! referrer still has somewhere to send traffic. Pure over a static
//! snapshot; the only state is the report it returns.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ConnectionGraph;

/// Outcome of one blackout simulation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerouteReport {
    /// Referrers for which at least one alternative was found
    pub rerouted_count: usize,
    /// Referrer id -> surviving outbound targets
    pub routes: HashMap<String, Vec<String>>,
    /// Distinct referrers with an edge into the blackout set
    pub affected: usize,
    /// Referrers left with no surviving outbound target
    pub stranded: Vec<String>,
    /// True when the time budget expired before every blacked-out node
    /// was visited; the partial report is valid but incomplete
    pub truncated: bool,
    pub elapsed_ms: f64,
}

/// Discover alternative routes around a set of blacked-out nodes
///
/// For each blacked-out `B`, the inbound index yields every referrer
/// `A -> B`; each referrer's outbound index is then scanned for targets
/// outside the blackout set. Never rescans the raw edge list.
pub fn discover_routes(
    graph: &ConnectionGraph,
    blackout: &HashSet<String>,
    budget: Duration,
) -> RerouteReport {
    let start = Instant::now();
    let mut report = RerouteReport::default();
    let mut visited: HashSet<&str> = HashSet::new();

    let mut blacked: Vec<&String> = blackout.iter().collect();
    blacked.sort();

    for node in blacked {
        if start.elapsed() > budget {
            report.truncated = true;
            break;
        }
        for referrer in graph.inbound(node) {
            if blackout.contains(referrer) || !visited.insert(referrer.as_str()) {
                continue;
            }
            let alternatives: Vec<String> = graph
                .outbound(referrer)
                .iter()
                .filter(|target| !blackout.contains(*target))
                .cloned()
                .collect();
            if alternatives.is_empty() {
                report.stranded.push(referrer.clone());
            } else {
                report.routes.insert(referrer.clone(), alternatives);
            }
        }
    }

    report.affected = visited.len();
    report.rerouted_count = report.routes.len();
    report.stranded.sort();
    report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    report
}
