//! Memory-capped event batching
//!
//! Wraps the ingestor and scorer for high-volume streams. The stream is a
//! finite, pull-based iterator: the consumer decides when the next chunk
//! runs, which makes backpressure the consumer's pull rate and makes
//! cancellation "stop pulling". Restart requires a full reinvocation.
//!
//! The engine holds shared references and scalar aggregates only; chunk
//! buffers are dropped before the memory sample, and nothing derived from
//! an individual event outlives its chunk except the dedup window, which
//! is bounded and is the first thing released under pressure.

use chrono::{DateTime, Utc};
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{debug, error};

use reso_core::{
    IngestConfig, IngestStats, NodeRegistry, RawSignalRecord, ResonanceScorer, SignalIngestor,
};

use crate::BatchingConfig;

/// Terminal batching failures
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "memory hard-kill threshold crossed: {memory_mb:.1} MB > {limit_mb:.1} MB \
         (last processed node: {last_node_id:?})"
    )]
    MemoryHardKill {
        memory_mb: f64,
        limit_mb: f64,
        /// Reported so an external caller can resume reprocessing after
        /// this node
        last_node_id: Option<String>,
    },
}

/// Where the engine reads its memory usage from
///
/// Production uses the process RSS; tests script the readings.
pub trait MemoryProbe {
    fn sample_mb(&mut self) -> f64;
}

/// RSS of the current process via sysinfo
pub struct ProcessProbe {
    system: System,
    pid: Pid,
}

impl ProcessProbe {
    pub fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        Some(Self {
            system: System::new(),
            pid,
        })
    }
}

impl MemoryProbe for ProcessProbe {
    fn sample_mb(&mut self) -> f64 {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system
            .process(self.pid)
            .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    }
}

/// One record per processed chunk
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Cumulative events consumed from the stream, including isolated ones
    pub events_processed: usize,
    /// Cumulative poisoned records kept away from the graph
    pub isolated: usize,
    pub memory_mb: f64,
    pub peak_memory_mb: f64,
    pub total_batches: usize,
    /// Chunk size currently in effect after any backpressure halving
    pub effective_batch_size: usize,
    /// True when this chunk crossed the soft ceiling
    pub pressured: bool,
}

/// Wraps ingestor + scorer for a memory-capped streaming pass
pub struct EventBatchingEngine {
    config: BatchingConfig,
    ingest: IngestConfig,
    probe: Box<dyn MemoryProbe>,
}

impl EventBatchingEngine {
    pub fn new(config: BatchingConfig, ingest: IngestConfig, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            config,
            ingest,
            probe,
        }
    }

    /// Consume the engine into a pull-based stream of batch reports
    ///
    /// Signals are applied to `registry` in place as chunks are pulled;
    /// stopping early leaves a valid, partially-scored registry.
    pub fn process_events(
        self,
        registry: &mut NodeRegistry,
        events: Vec<RawSignalRecord>,
        now: DateTime<Utc>,
    ) -> BatchStream<'_> {
        let effective_batch = self.config.batch_size.max(1);
        BatchStream {
            registry,
            events: events.into_iter(),
            ingestor: SignalIngestor::new(self.ingest, now),
            scorer: ResonanceScorer::default(),
            probe: self.probe,
            config: self.config,
            effective_batch,
            events_processed: 0,
            unmatched: 0,
            total_batches: 0,
            peak_memory_mb: 0.0,
            last_node_id: None,
            dead: false,
        }
    }
}

/// Finite iterator of per-chunk reports; see module docs for the model
pub struct BatchStream<'r> {
    registry: &'r mut NodeRegistry,
    events: std::vec::IntoIter<RawSignalRecord>,
    ingestor: SignalIngestor,
    scorer: ResonanceScorer,
    probe: Box<dyn MemoryProbe>,
    config: BatchingConfig,
    effective_batch: usize,
    events_processed: usize,
    unmatched: usize,
    total_batches: usize,
    peak_memory_mb: f64,
    last_node_id: Option<String>,
    dead: bool,
}

impl BatchStream<'_> {
    pub fn ingest_stats(&self) -> &IngestStats {
        self.ingestor.stats()
    }

    /// Valid signals whose node id matched nothing in the registry
    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    pub fn last_node_id(&self) -> Option<&str> {
        self.last_node_id.as_deref()
    }
}

impl Iterator for BatchStream<'_> {
    type Item = Result<BatchReport, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dead {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.effective_batch.min(4096));
        while chunk.len() < self.effective_batch {
            match self.events.next() {
                Some(event) => chunk.push(event),
                None => break,
            }
        }
        if chunk.is_empty() {
            return None;
        }

        let consumed = chunk.len();
        for record in &chunk {
            let Some(signal) = self.ingestor.ingest_record(record) else {
                continue;
            };
            match self.registry.get_mut(&signal.node_id) {
                Some(node) => {
                    self.scorer.apply_signal(node, &signal);
                    self.last_node_id = Some(signal.node_id);
                }
                None => self.unmatched += 1,
            }
        }
        // Chunk buffers go before the sample so the reading reflects
        // retained state, not the chunk in flight
        drop(chunk);

        self.events_processed += consumed;
        self.total_batches += 1;

        let memory_mb = self.probe.sample_mb();
        if memory_mb > self.peak_memory_mb {
            self.peak_memory_mb = memory_mb;
        }

        if memory_mb > self.config.hard_kill_mb {
            self.dead = true;
            error!(
                "hard-kill at {:.1} MB after {} events",
                memory_mb, self.events_processed
            );
            return Some(Err(EngineError::MemoryHardKill {
                memory_mb,
                limit_mb: self.config.hard_kill_mb,
                last_node_id: self.last_node_id.clone(),
            }));
        }

        let pressured = memory_mb > self.config.max_memory_mb;
        if pressured {
            let halved = (self.effective_batch / 2).max(self.config.min_batch_size.max(1));
            if halved < self.effective_batch {
                debug!(
                    "memory pressure at {:.1} MB: batch size {} -> {}",
                    memory_mb, self.effective_batch, halved
                );
                self.effective_batch = halved;
            }
            self.ingestor.relieve();
        }

        Some(Ok(BatchReport {
            events_processed: self.events_processed,
            isolated: self.ingestor.stats().isolated,
            memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            total_batches: self.total_batches,
            effective_batch_size: self.effective_batch,
            pressured,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reso_core::{Node, NodeKind};

    /// Replays a scripted sequence of readings, then holds the last one
    struct ScriptedProbe {
        readings: Vec<f64>,
        cursor: usize,
    }

    impl ScriptedProbe {
        fn new(readings: Vec<f64>) -> Box<Self> {
            Box::new(Self { readings, cursor: 0 })
        }
    }

    impl MemoryProbe for ScriptedProbe {
        fn sample_mb(&mut self) -> f64 {
            let reading = self.readings[self.cursor.min(self.readings.len() - 1)];
            self.cursor += 1;
            reading
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.insert(Node::new(NodeKind::Tool, "b", "B", "sleep", "tools"));
        registry.insert(Node::new(NodeKind::Gate, "sleep", "Sleep", "sleep", "gates"));
        registry
    }

    fn events(count: usize) -> Vec<RawSignalRecord> {
        (0..count)
            .map(|i| RawSignalRecord {
                path: Some(if i % 2 == 0 { "/tools/b" } else { "/gates/sleep" }.to_string()),
                impressions: Some(100.0),
                clicks: Some((i % 20) as f64),
                dwell_seconds: Some((i % 300) as f64),
                timestamp: Some(reso_core::RawTimestamp::Epoch(1_748_000_000.0 + i as f64)),
                ..RawSignalRecord::default()
            })
            .collect()
    }

    fn engine(batch_size: usize, probe: Box<dyn MemoryProbe>) -> EventBatchingEngine {
        let config = BatchingConfig {
            max_memory_mb: 45.0,
            batch_size,
            min_batch_size: 32,
            hard_kill_mb: 256.0,
        };
        EventBatchingEngine::new(config, IngestConfig::default(), probe)
    }

    #[test]
    fn test_large_stream_is_fully_consumed_under_ceiling() {
        let mut registry = registry();
        let total = 162_004usize;
        let stream_events = events(total);

        // Steady readings below the ceiling
        let engine = engine(1000, ScriptedProbe::new(vec![30.0]));
        let now = Utc::now();
        let mut stream = engine.process_events(&mut registry, stream_events, now);

        let mut last = None;
        for item in &mut stream {
            last = Some(item.expect("no hard kill expected"));
        }
        let last = last.unwrap();

        assert_eq!(last.events_processed, total);
        assert_eq!(last.total_batches, total.div_ceil(1000));
        assert!(last.peak_memory_mb <= 45.0);
    }

    #[test]
    fn test_backpressure_halves_effective_batch() {
        let mut registry = registry();
        // Two pressured chunks, then relief
        let probe = ScriptedProbe::new(vec![50.0, 48.0, 30.0]);
        let engine = engine(1000, probe);
        let mut stream = engine.process_events(&mut registry, events(5000), Utc::now());

        let first = stream.next().unwrap().unwrap();
        assert!(first.pressured);
        assert_eq!(first.effective_batch_size, 500);

        let second = stream.next().unwrap().unwrap();
        assert!(second.pressured);
        assert_eq!(second.effective_batch_size, 250);

        let third = stream.next().unwrap().unwrap();
        assert!(!third.pressured);
        assert_eq!(third.effective_batch_size, 250);

        // Peak reflects the worst reading even after relief
        assert_eq!(third.peak_memory_mb, 50.0);
    }

    #[test]
    fn test_halving_floors_at_min_batch_size() {
        let mut registry = registry();
        let probe = ScriptedProbe::new(vec![60.0]);
        let engine = engine(64, probe);
        let mut stream = engine.process_events(&mut registry, events(1000), Utc::now());

        let mut last_size = 64;
        for item in &mut stream {
            last_size = item.unwrap().effective_batch_size;
        }
        assert_eq!(last_size, 32);
    }

    #[test]
    fn test_hard_kill_reports_last_node_and_fuses() {
        let mut registry = registry();
        let probe = ScriptedProbe::new(vec![30.0, 300.0]);
        let engine = engine(10, probe);
        let mut stream = engine.process_events(&mut registry, events(100), Utc::now());

        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        match err {
            EngineError::MemoryHardKill { last_node_id, .. } => {
                assert!(last_node_id.is_some());
            }
        }
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_stopping_early_leaves_partial_but_valid_scores() {
        let mut registry = registry();
        let engine = engine(10, ScriptedProbe::new(vec![30.0]));
        let mut stream = engine.process_events(&mut registry, events(100), Utc::now());

        // Pull a single chunk, then cancel by dropping the stream
        let report = stream.next().unwrap().unwrap();
        assert_eq!(report.events_processed, 10);
        drop(stream);

        let node = registry.get("tool::b").unwrap();
        assert!(node.resonance_score > 1.0);
        assert!(node.last_signal_at.is_some());
    }

    #[test]
    fn test_thousand_poisoned_signals_fully_isolated() {
        let mut registry = crate::synthetic_registry(5, 4);
        let poisoned = crate::synthetic_events(&registry, 1_000, 1.0, 99);

        let engine = engine(100, ScriptedProbe::new(vec![30.0]));
        let mut stream = engine.process_events(&mut registry, poisoned, Utc::now());
        let mut last = None;
        for item in &mut stream {
            last = Some(item.unwrap());
        }
        assert_eq!(stream.ingest_stats().isolated, 1_000);
        assert_eq!(last.unwrap().events_processed, 1_000);
        drop(stream);

        // Zero mutation: every node still sits at its build baseline
        for node in registry.iter() {
            assert_eq!(node.resonance_score, 1.0);
            assert_eq!(node.decay, 0.0);
            assert!(node.last_signal_at.is_none());
        }
    }

    #[test]
    fn test_unmatched_nodes_are_counted_not_fatal() {
        let mut registry = registry();
        let engine = engine(10, ScriptedProbe::new(vec![30.0]));
        let unmatched_events = vec![RawSignalRecord {
            node_id: Some("tool::unknown".to_string()),
            impressions: Some(10.0),
            clicks: Some(1.0),
            ..RawSignalRecord::default()
        }];
        let mut stream = engine.process_events(&mut registry, unmatched_events, Utc::now());
        assert!(stream.next().unwrap().is_ok());
        assert_eq!(stream.unmatched(), 1);
    }
}
