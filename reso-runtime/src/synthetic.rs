//! Synthetic registries and event streams for soak runs
//!
//! The soak command streams a large generated event load through the
//! batch engine to exercise the memory ceiling on real hardware; tests
//! reuse the same generator with a fixed seed.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use reso_core::{Node, NodeKind, NodeRegistry, RawSignalRecord, RawTimestamp};

/// Build a plausible registry: gates, each with tools and pain points
pub fn synthetic_registry(gates: usize, tools_per_gate: usize) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    for g in 0..gates {
        let gate_slug = format!("g{g}");
        registry.insert(Node::new(
            NodeKind::Gate,
            &gate_slug,
            &format!("Gate {g}"),
            &gate_slug,
            "synthetic",
        ));
        for t in 0..tools_per_gate {
            registry.insert(Node::new(
                NodeKind::Tool,
                &format!("g{g}-t{t}"),
                &format!("Tool {g}/{t}"),
                &gate_slug,
                "synthetic",
            ));
            registry.insert(Node::new(
                NodeKind::PainPoint,
                &format!("g{g}-p{t}"),
                &format!("Pain {g}/{t}"),
                &gate_slug,
                "synthetic",
            ));
        }
    }
    registry
}

/// Generate `count` raw events against the registry's paths
///
/// `poison_fraction` of the stream is deliberately malformed (NaN
/// metrics, negative counts, far-future timestamps, self links) to
/// exercise isolation alongside volume.
pub fn synthetic_events(
    registry: &NodeRegistry,
    count: usize,
    poison_fraction: f64,
    seed: u64,
) -> Vec<RawSignalRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ids: Vec<&str> = registry.iter().map(|node| node.id.as_str()).collect();
    let base: DateTime<Utc> = Utc::now() - Duration::days(7);

    (0..count)
        .map(|_| {
            let id = ids[rng.gen_range(0..ids.len())];
            let impressions = rng.gen_range(1.0..5_000.0f64).floor();
            let clicks = (impressions * rng.gen_range(0.0..0.3)).floor();
            let at = base + Duration::seconds(rng.gen_range(0..7 * 86_400));

            let mut record = RawSignalRecord {
                node_id: Some(id.to_string()),
                impressions: Some(impressions),
                clicks: Some(clicks),
                dwell_seconds: Some(rng.gen_range(0.0..600.0)),
                navigation_depth: Some(rng.gen_range(0.0..8.0f64).floor()),
                timestamp: Some(RawTimestamp::Epoch(at.timestamp() as f64)),
                ..RawSignalRecord::default()
            };

            if rng.gen_bool(poison_fraction.clamp(0.0, 1.0)) {
                match rng.gen_range(0..4) {
                    0 => record.impressions = Some(f64::NAN),
                    1 => record.clicks = Some(-42.0),
                    2 => record.timestamp = Some(RawTimestamp::Epoch(99_999_999_999_999.0)),
                    _ => record.link_target = record.node_id.clone(),
                }
            }
            record
        })
        .collect()
}
