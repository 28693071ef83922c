//! Propagation stability checks over densely-connected clusters
//!
//! Verifies that localized weight propagation settles instead of
//! oscillating or diverging. Weights are damped toward the neighborhood
//! mean and clamped to [0.5, 1.0] every iteration; dropping that clamp is
//! the divergence bug this engine exists to catch.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use reso_core::NodeRegistry;

use crate::ConnectionGraph;

/// Damping factor: how much of a node's own weight survives an iteration
const DAMPING: f64 = 0.7;

/// Iteration stops once the largest per-node change drops below this
const DELTA_EPSILON: f64 = 0.001;

/// Propagation weights live in this interval
const WEIGHT_MIN: f64 = 0.5;
const WEIGHT_MAX: f64 = 1.0;

/// Outcome of one convergence check
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceReport {
    pub converged: bool,
    pub iterations: usize,
    /// Largest per-node change seen in the final iteration
    pub max_delta: f64,
    pub cluster_size: usize,
}

impl ConvergenceReport {
    /// A run that exhausted its iterations needs normalization upstream;
    /// it is a finding, not a failure
    pub fn needs_normalization(&self) -> bool {
        !self.converged
    }
}

/// Consumes the shared adjacency indices to grow and test clusters
pub struct ConvergenceEngine<'g> {
    graph: &'g ConnectionGraph,
}

impl<'g> ConvergenceEngine<'g> {
    pub fn new(graph: &'g ConnectionGraph) -> Self {
        Self { graph }
    }

    /// Greedily grow a connected cluster of up to `n` nodes
    ///
    /// Seeds at the node with the most bidirectional edges, then expands
    /// by neighbor interconnection density: each step admits the frontier
    /// node with the most links into the selected set, bidirectional
    /// links counted double. Ties break on id for determinism.
    pub fn create_test_cluster(&self, n: usize) -> Vec<String> {
        let Some(seed) = self
            .graph
            .ids()
            .max_by(|a, b| {
                self.graph
                    .bidirectional_degree(a)
                    .cmp(&self.graph.bidirectional_degree(b))
                    .then_with(|| b.cmp(a))
            })
            .map(str::to_string)
        else {
            return Vec::new();
        };

        let mut selected = vec![seed.clone()];
        let mut selected_set: HashSet<String> = HashSet::from([seed.clone()]);
        let mut frontier: HashSet<String> = self
            .graph
            .undirected_neighbors(&seed)
            .into_iter()
            .collect();

        while selected.len() < n && !frontier.is_empty() {
            let next = frontier
                .iter()
                .max_by(|a, b| {
                    self.interconnection(a, &selected_set)
                        .cmp(&self.interconnection(b, &selected_set))
                        .then_with(|| b.cmp(a))
                })
                .cloned()
                .expect("frontier is non-empty");

            frontier.remove(&next);
            for neighbor in self.graph.undirected_neighbors(&next) {
                if !selected_set.contains(&neighbor) {
                    frontier.insert(neighbor);
                }
            }
            selected_set.insert(next.clone());
            selected.push(next);
        }
        selected
    }

    /// Density score for a candidate: directed links to and from the
    /// selected set, so a bidirectional pair counts twice
    fn interconnection(&self, candidate: &str, selected: &HashSet<String>) -> usize {
        let outward = self
            .graph
            .outbound(candidate)
            .iter()
            .filter(|t| selected.contains(*t))
            .count();
        let inward = self
            .graph
            .inbound(candidate)
            .iter()
            .filter(|s| selected.contains(*s))
            .count();
        outward + inward
    }

    /// Seed one cluster node at an extreme weight and iterate damped
    /// propagation until the cluster settles or `max_iterations` is spent
    ///
    /// Weights initialize from `clamp(resonance_score, 0.5, 1.0)`. Each
    /// iteration computes `0.7·w + 0.3·mean(in-cluster neighbor w)` from
    /// the previous iteration's snapshot, then clamps back into
    /// [0.5, 1.0] before the next round.
    pub fn test_convergence(
        &self,
        registry: &NodeRegistry,
        cluster: &[String],
        max_iterations: usize,
    ) -> ConvergenceReport {
        let index: HashMap<&str, usize> = cluster
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        // In-cluster undirected neighbor lists, resolved once
        let neighbors: Vec<Vec<usize>> = cluster
            .iter()
            .map(|id| {
                self.graph
                    .undirected_neighbors(id)
                    .iter()
                    .filter_map(|n| index.get(n.as_str()).copied())
                    .collect()
            })
            .collect();

        let mut weights: Vec<f64> = cluster
            .iter()
            .map(|id| {
                registry
                    .get(id)
                    .map(|node| node.resonance_score.clamp(WEIGHT_MIN, WEIGHT_MAX))
                    .unwrap_or(0.75)
            })
            .collect();
        if let Some(first) = weights.first_mut() {
            *first = 0.99;
        }

        let mut next = weights.clone();
        let mut max_delta = f64::INFINITY;

        for iteration in 1..=max_iterations {
            max_delta = 0.0f64;
            for (i, in_cluster) in neighbors.iter().enumerate() {
                let blended = if in_cluster.is_empty() {
                    weights[i]
                } else {
                    let mean: f64 =
                        in_cluster.iter().map(|&j| weights[j]).sum::<f64>() / in_cluster.len() as f64;
                    DAMPING * weights[i] + (1.0 - DAMPING) * mean
                };
                let clamped = blended.clamp(WEIGHT_MIN, WEIGHT_MAX);
                max_delta = max_delta.max((clamped - weights[i]).abs());
                next[i] = clamped;
            }
            std::mem::swap(&mut weights, &mut next);

            if max_delta < DELTA_EPSILON {
                return ConvergenceReport {
                    converged: true,
                    iterations: iteration,
                    max_delta,
                    cluster_size: cluster.len(),
                };
            }
        }

        ConvergenceReport {
            converged: false,
            iterations: max_iterations,
            max_delta,
            cluster_size: cluster.len(),
        }
    }
}
