//! Resograph CLI
//!
//! Scores a content graph from usage telemetry and runs the resilience
//! and stability checks against the scored output.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use reso_core::{NodeRegistry, ScoredRegistry};
use reso_graph::{discover_routes, ConnectionGraph, ConvergenceEngine, EdgeFile};
use reso_runtime::{
    build_graph, run, synthetic_events, synthetic_registry, EngineConfig, EventBatchingEngine,
    MemoryProbe, ProcessProbe, RunContext, RunPaths,
};

#[derive(Parser)]
#[command(name = "resograph")]
#[command(author, version, about = "Resograph: resonance scoring over content usage signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full scoring pass and write the output artifacts
    Run {
        /// Directory with gates.json, pain-points.json, tools.json, insights.json
        #[arg(long)]
        content_dir: PathBuf,

        /// Directory with signal-batch.json, events.ndjson, analytics.json
        #[arg(long)]
        signals_dir: PathBuf,

        /// Recommendation edge file
        #[arg(long)]
        edges: PathBuf,

        /// Output directory for the registry and drafts artifacts
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Optional TOML config
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Black out the most central nodes and check rerouting
    Blackout {
        /// A scored registry written by `run`
        #[arg(long)]
        registry: PathBuf,

        /// Recommendation edge file
        #[arg(long)]
        edges: PathBuf,

        /// Percentage of nodes to black out, by centrality
        #[arg(long, default_value = "1.0")]
        top_percent: f64,

        /// Time budget in milliseconds
        #[arg(long, default_value = "50")]
        budget_ms: u64,
    },

    /// Grow a dense cluster and verify weight propagation settles
    Converge {
        /// A scored registry written by `run`
        #[arg(long)]
        registry: PathBuf,

        /// Recommendation edge file
        #[arg(long)]
        edges: PathBuf,

        /// Cluster size to grow
        #[arg(long, default_value = "50")]
        cluster_size: usize,

        #[arg(long, default_value = "25")]
        max_iterations: usize,
    },

    /// Stream synthetic events through the batch engine under a ceiling
    Soak {
        #[arg(long, default_value = "162004")]
        events: usize,

        /// Soft memory ceiling in MB
        #[arg(long, default_value = "45.0")]
        memory_mb: f64,

        #[arg(long, default_value = "1000")]
        batch_size: usize,

        /// Fraction of the stream to poison
        #[arg(long, default_value = "0.0")]
        poison: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            content_dir,
            signals_dir,
            edges,
            out_dir,
            config,
        } => run_scoring(content_dir, signals_dir, edges, out_dir, config),
        Commands::Blackout {
            registry,
            edges,
            top_percent,
            budget_ms,
        } => run_blackout(registry, edges, top_percent, budget_ms),
        Commands::Converge {
            registry,
            edges,
            cluster_size,
            max_iterations,
        } => run_converge(registry, edges, cluster_size, max_iterations),
        Commands::Soak {
            events,
            memory_mb,
            batch_size,
            poison,
        } => run_soak(events, memory_mb, batch_size, poison),
    }
}

fn run_scoring(
    content_dir: PathBuf,
    signals_dir: PathBuf,
    edges: PathBuf,
    out_dir: PathBuf,
    config: Option<PathBuf>,
) -> Result<()> {
    println!("🔊 Resograph scoring run\n");

    let config = config
        .map(|path| EngineConfig::load(&path))
        .unwrap_or_default();
    let mut ctx = RunContext::new(config);
    let paths = RunPaths {
        content_dir,
        signals_dir,
        edges,
        out_dir,
    };

    let summary = run(&mut ctx, &paths)?;

    println!("✅ Run {} complete", summary.run_id);
    println!("   Nodes:   {} built, {} edges indexed", summary.nodes_built, summary.edges_indexed);
    println!(
        "   Events:  {} over {} batches ({} isolated, {} unresolved, {} duplicate, {} unmatched)",
        summary.events_processed,
        summary.batches,
        summary.ingest.isolated,
        summary.ingest.unresolved,
        summary.ingest.duplicates,
        summary.unmatched,
    );
    println!("   Memory:  peak {:.1} MB", summary.peak_memory_mb);
    println!(
        "   Drafts:  {} link adjustments, {} expansion candidates",
        summary.link_adjustments, summary.expansion_candidates
    );
    println!("📄 Registry: {}", summary.registry_path.display());
    println!("📄 Drafts:   {}", summary.drafts_path.display());

    if !summary.warnings.is_empty() {
        println!("\n⚠️  {} warnings (inputs degraded to empty):", summary.warnings.len());
        for warning in &summary.warnings {
            println!("   - {}", warning);
        }
    }
    Ok(())
}

/// Load a scored registry and rebuild the adjacency indices beside it
fn load_snapshot(registry: &PathBuf, edges: &PathBuf) -> Result<(NodeRegistry, ConnectionGraph)> {
    let raw = std::fs::read_to_string(registry)
        .with_context(|| format!("reading {}", registry.display()))?;
    let scored: ScoredRegistry = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", registry.display()))?;
    let registry = NodeRegistry::from_nodes(scored.nodes);

    let raw = std::fs::read_to_string(edges)
        .with_context(|| format!("reading {}", edges.display()))?;
    let edge_file: EdgeFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", edges.display()))?;
    let graph = build_graph(&registry, &edge_file.recommendations);
    Ok((registry, graph))
}

fn run_blackout(registry: PathBuf, edges: PathBuf, top_percent: f64, budget_ms: u64) -> Result<()> {
    let (registry, graph) = load_snapshot(&registry, &edges)?;
    println!(
        "🕳️  Blackout check: {} nodes, {} edges, top {:.1}% by centrality\n",
        registry.len(),
        graph.edge_count(),
        top_percent
    );

    let count = ((graph.node_count() as f64 * top_percent / 100.0).ceil() as usize).max(1);
    let blackout: HashSet<String> = graph
        .ranked_by_centrality()
        .into_iter()
        .take(count)
        .map(|(id, _)| id)
        .collect();

    let report = discover_routes(&graph, &blackout, Duration::from_millis(budget_ms));

    println!("   Blacked out: {}", blackout.len());
    println!("   Affected referrers: {}", report.affected);
    println!("   Rerouted: {}", report.rerouted_count);
    println!("   Stranded: {}", report.stranded.len());
    println!("   Elapsed: {:.2} ms{}", report.elapsed_ms, if report.truncated { " (budget hit, partial)" } else { "" });

    if report.stranded.is_empty() && !report.truncated {
        println!("\n✅ Every affected referrer has an alternative route");
    } else if !report.stranded.is_empty() {
        println!("\n⚠️  {} referrers have no structural alternative:", report.stranded.len());
        for id in report.stranded.iter().take(10) {
            println!("   - {}", id);
        }
    }
    Ok(())
}

fn run_converge(
    registry: PathBuf,
    edges: PathBuf,
    cluster_size: usize,
    max_iterations: usize,
) -> Result<()> {
    let (registry, graph) = load_snapshot(&registry, &edges)?;
    let engine = ConvergenceEngine::new(&graph);

    let cluster = engine.create_test_cluster(cluster_size);
    if cluster.is_empty() {
        println!("⚠️  No connected nodes to grow a cluster from");
        return Ok(());
    }
    println!(
        "🌀 Convergence check: cluster of {} (requested {})\n",
        cluster.len(),
        cluster_size
    );

    let report = engine.test_convergence(&registry, &cluster, max_iterations);
    println!("   Iterations: {}", report.iterations);
    println!("   Final max delta: {:.6}", report.max_delta);

    if report.converged {
        println!("\n✅ Propagation settled");
    } else {
        println!("\n⚠️  Did not settle within {} iterations; cluster needs normalization", max_iterations);
    }
    Ok(())
}

fn run_soak(events: usize, memory_mb: f64, batch_size: usize, poison: f64) -> Result<()> {
    println!(
        "🧪 Soak: {} synthetic events, {:.0} MB ceiling, batch {}\n",
        events, memory_mb, batch_size
    );

    let registry_template = synthetic_registry(40, 25);
    let stream_events = synthetic_events(&registry_template, events, poison, 42);
    let mut registry = registry_template;

    let mut config = EngineConfig::default();
    config.batching.max_memory_mb = memory_mb;
    config.batching.batch_size = batch_size;

    let probe: Box<dyn MemoryProbe> = Box::new(
        ProcessProbe::new().context("process memory probe unavailable on this platform")?,
    );
    let engine = EventBatchingEngine::new(config.batching.clone(), config.ingest.clone(), probe);

    let now = chrono::Utc::now();
    let mut stream = engine.process_events(&mut registry, stream_events, now);

    let mut last = None;
    let mut pressured_batches = 0usize;
    for item in &mut stream {
        let report = item?;
        if report.pressured {
            pressured_batches += 1;
        }
        last = Some(report);
    }
    let stats = stream.ingest_stats().clone();

    match last {
        Some(report) => {
            println!("   Events processed: {}", report.events_processed);
            println!("   Batches: {} ({} pressured)", report.total_batches, pressured_batches);
            println!("   Final batch size: {}", report.effective_batch_size);
            println!("   Peak memory: {:.1} MB", report.peak_memory_mb);
            println!(
                "   Accepted {} / isolated {} / duplicate {}",
                stats.accepted, stats.isolated, stats.duplicates
            );
            println!("\n✅ Stream fully consumed");
        }
        None => println!("⚠️  Nothing to process"),
    }
    Ok(())
}
