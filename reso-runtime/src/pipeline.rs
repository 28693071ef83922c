//! The full scoring run
//!
//! structural files -> registry -> edges -> adjacency -> signal sources
//! -> batch engine -> final decay pass -> output artifacts. Every input
//! degrades to an empty contribution; only a memory hard-kill aborts.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use reso_core::{
    IngestStats, NodeRegistry, NodeRegistryBuilder, ResonanceScorer, ScoredRegistry,
};
use reso_graph::{ConnectionGraph, RecommendationEdge};

use crate::{
    derive_drafts, load_analytics, load_edges, load_gates, load_insights, load_ndjson_events,
    load_pain_points, load_signal_batch, load_tools, EventBatchingEngine, ProcessProbe,
    RunContext,
};
use crate::batching::MemoryProbe;

/// Input file locations for one run
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Directory holding gates.json, pain-points.json, tools.json, insights.json
    pub content_dir: PathBuf,
    /// Directory holding signal-batch.json, events.ndjson, analytics.json
    pub signals_dir: PathBuf,
    /// The recommendations edge file
    pub edges: PathBuf,
    /// Output directory for the registry and drafts artifacts
    pub out_dir: PathBuf,
}

impl RunPaths {
    fn structural(&self, name: &str) -> PathBuf {
        self.content_dir.join(name)
    }

    fn signals(&self, name: &str) -> PathBuf {
        self.signals_dir.join(name)
    }
}

/// What one run did, for the caller and the logs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub nodes_built: usize,
    pub edges_indexed: usize,
    pub events_processed: usize,
    pub batches: usize,
    pub peak_memory_mb: f64,
    pub ingest: IngestStats,
    pub unmatched: usize,
    pub link_adjustments: usize,
    pub expansion_candidates: usize,
    pub registry_path: PathBuf,
    pub drafts_path: PathBuf,
    pub warnings: Vec<String>,
}

/// Execute a full scoring run with the process-RSS memory probe
pub fn run(ctx: &mut RunContext, paths: &RunPaths) -> anyhow::Result<RunSummary> {
    let probe: Box<dyn MemoryProbe> = match ProcessProbe::new() {
        Some(probe) => Box::new(probe),
        None => {
            ctx.warn("process memory probe unavailable, ceiling checks disabled");
            Box::new(NullProbe)
        }
    };
    run_with_probe(ctx, paths, probe)
}

/// As `run`, with an injected memory probe
pub fn run_with_probe(
    ctx: &mut RunContext,
    paths: &RunPaths,
    probe: Box<dyn MemoryProbe>,
) -> anyhow::Result<RunSummary> {
    info!("run {} starting", ctx.run_id);

    // Structural sources -> node set
    let gates = load_gates(ctx, &paths.structural("gates.json"));
    let pain_points = load_pain_points(ctx, &paths.structural("pain-points.json"));
    let tools = load_tools(ctx, &paths.structural("tools.json"));
    let insights = load_insights(ctx, &paths.structural("insights.json"));

    let (mut registry, build_report) = NodeRegistryBuilder::new()
        .gates(gates)
        .pain_points(pain_points)
        .tools(tools)
        .insights(insights)
        .build();
    info!(
        "registry built: {} nodes ({} skipped, {} duplicate)",
        build_report.built, build_report.skipped, build_report.duplicates
    );

    // Edge list -> adjacency indices, built once for the whole run
    let edge_file = load_edges(ctx, &paths.edges);
    let graph = build_graph(&registry, &edge_file.recommendations);
    info!(
        "adjacency indexed: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    // Signal sources, in ascending freshness order
    let mut events = load_signal_batch(ctx, &paths.signals("signal-batch.json"));
    events.extend(load_ndjson_events(ctx, &paths.signals("events.ndjson")));
    events.extend(load_analytics(ctx, &paths.signals("analytics.json")));
    debug!("{} raw events queued", events.len());

    // Batch pass; the stream mutates the registry in place as it is pulled
    let engine = EventBatchingEngine::new(
        ctx.config.batching.clone(),
        ctx.config.ingest.clone(),
        probe,
    );
    let now = ctx.started_at;
    let mut stream = engine.process_events(&mut registry, events, now);

    let mut events_processed = 0;
    let mut batches = 0;
    let mut peak_memory_mb = 0.0f64;
    for item in &mut stream {
        let report = item.context("event batching aborted")?;
        events_processed = report.events_processed;
        batches = report.total_batches;
        peak_memory_mb = report.peak_memory_mb;
    }
    let ingest = stream.ingest_stats().clone();
    let unmatched = stream.unmatched();
    drop(stream);

    // Decay pass over the whole set; this mutates every node in place
    let scorer = ResonanceScorer::default();
    let decay_report = scorer.decay_pass(&mut registry, now);
    debug!(
        "decay pass: {} cold, {} aged, {} at floor",
        decay_report.cold, decay_report.aged, decay_report.floored
    );

    // Output artifacts
    std::fs::create_dir_all(&paths.out_dir)
        .with_context(|| format!("creating output dir {}", paths.out_dir.display()))?;

    let generated = Utc::now();
    let decimals = ctx.config.output.score_decimals;
    let registry_path = paths.out_dir.join(&ctx.config.output.registry_file);
    let scored = ScoredRegistry::from_registry(&registry, generated, decimals);
    write_json(&registry_path, &scored)?;

    let drafts_path = paths.out_dir.join(&ctx.config.output.drafts_file);
    let drafts = derive_drafts(&registry, &graph, &ctx.config.drafts, generated);
    write_json(&drafts_path, &drafts)?;

    info!(
        "run {} complete: {} events over {} batches, peak {:.1} MB",
        ctx.run_id, events_processed, batches, peak_memory_mb
    );

    Ok(RunSummary {
        run_id: ctx.run_id.to_string(),
        nodes_built: build_report.built,
        edges_indexed: graph.edge_count(),
        events_processed,
        batches,
        peak_memory_mb,
        ingest,
        unmatched,
        link_adjustments: drafts.link_adjustments.len(),
        expansion_candidates: drafts.expansion_candidates.len(),
        registry_path,
        drafts_path,
        warnings: ctx.warnings().to_vec(),
    })
}

/// Index the edge list against the built registry
pub fn build_graph(registry: &NodeRegistry, edges: &[RecommendationEdge]) -> ConnectionGraph {
    ConnectionGraph::build(edges, |id| registry.contains(id))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Probe of last resort when the platform offers no process metrics
struct NullProbe;

impl MemoryProbe for NullProbe {
    fn sample_mb(&mut self) -> f64 {
        0.0
    }
}
