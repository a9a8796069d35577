//! Rank propagation (damped `PageRank`, delta-push form)
//!
//! ```text
//! rank(v) = (1-d)/N + d * (Σ rank(u) / outdegree(u) + dangling / N)
//! ```
//!
//! Instead of recomputing every vertex each round, an active vertex pushes the
//! change of its rank since its last push (`rank - sent`) along its out-edges.
//! Receivers accumulate incoming mass in `acc` and recompute their rank from
//! it; a vertex stays active while its accumulated change exceeds the
//! convergence threshold. Mass of vertices without out-edges goes into a
//! dangling pool shared by all partitions and is spread uniformly.
//!
//! At any iteration boundary `Σ rank = 1 - d/(1-d) * Σ (rank - sent)`: change
//! held back by the threshold has not reached the receivers yet. Extraction
//! scales the ranks back to a total of one.

use super::{EdgeRef, Functor};
use crate::config::{AlgorithmKind, RunConfig};
use crate::error::{FrontierError, Result};
use crate::partition::{local_id, Partition};
use crate::problem::Algorithm;
use crate::types::{Rank, SizeT, VertexId};
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-partition rank state
#[derive(Debug)]
pub struct RankState<R: Rank> {
    rank: Vec<R::Atomic>,
    sent: Vec<R::Atomic>,
    pending: Vec<R::Atomic>,
    acc: Vec<R::Atomic>,
    dangling: Arc<R::Atomic>,
    seen_dangling: R::Atomic,
}

impl<R: Rank> RankState<R> {
    /// Current rank of a local vertex
    #[must_use]
    pub fn rank(&self, local: usize) -> R {
        R::load(&self.rank[local])
    }

    /// Total mass pushed by dangling vertices so far
    #[must_use]
    pub fn dangling_mass(&self) -> R {
        R::load(&self.dangling)
    }
}

/// Edge and filter kernels of rank propagation
#[derive(Debug, Clone, Copy)]
pub struct RankFunctor<V, R> {
    damping: R,
    threshold: R,
    teleport: R,
    inv_nodes: R,
    _marker: PhantomData<fn() -> V>,
}

impl<V: VertexId, R: Rank> RankFunctor<V, R> {
    /// Kernels for a graph of `node_count` vertices
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(damping: f64, threshold: f64, node_count: usize) -> Self {
        let n = node_count.max(1) as f64;
        Self {
            damping: R::from_f64(damping),
            threshold: R::from_f64(threshold),
            teleport: R::from_f64((1.0 - damping) / n),
            inv_nodes: R::from_f64(1.0 / n),
            _marker: PhantomData,
        }
    }
}

impl<V: VertexId, R: Rank> Functor for RankFunctor<V, R> {
    type Vertex = V;
    type State = RankState<R>;

    fn apply_source(&self, state: &Self::State, v: usize, degree: usize, _iteration: u32) {
        let rank = R::load(&state.rank[v]);
        let sent = R::swap(&state.sent[v], rank);
        let delta = rank - sent;
        R::store(&state.pending[v], delta);
        if degree == 0 && delta != R::zero() {
            R::fetch_add(&state.dangling, delta);
        }
    }

    fn cond_edge(&self, state: &Self::State, edge: &EdgeRef<V>, _iteration: u32) -> bool {
        R::load(&state.pending[edge.src]) != R::zero()
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply_edge(&self, state: &Self::State, edge: &EdgeRef<V>, _iteration: u32) {
        let share = R::load(&state.pending[edge.src]) / R::from_f64(edge.src_degree as f64);
        R::fetch_add(&state.acc[edge.dst], share);
    }

    fn cond_filter(&self, state: &Self::State, v: usize, _iteration: u32) -> bool {
        let inflow = R::load(&state.acc[v]) + R::load(&state.dangling) * self.inv_nodes;
        let rank = self.teleport + self.damping * inflow;
        R::store(&state.rank[v], rank);
        (rank - R::load(&state.sent[v])).abs() > self.threshold
    }
}

/// Rank-propagation primitive
///
/// `V` vertex ids, `S` row offsets, `R` rank values. Each instance owns its
/// dangling pool, so one instance drives exactly one problem.
#[derive(Debug)]
pub struct RankPropagation<V, S, R: Rank> {
    dangling: Arc<R::Atomic>,
    _marker: PhantomData<fn() -> (V, S)>,
}

impl<V: VertexId, S: SizeT, R: Rank> RankPropagation<V, S, R> {
    /// New primitive with an empty dangling pool
    #[must_use]
    pub fn new() -> Self {
        Self {
            dangling: Arc::new(R::new_atomic(R::zero())),
            _marker: PhantomData,
        }
    }
}

impl<V: VertexId, S: SizeT, R: Rank> Default for RankPropagation<V, S, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: VertexId, S: SizeT, R: Rank> Algorithm for RankPropagation<V, S, R> {
    type Vertex = V;
    type Offset = S;
    type State = RankState<R>;
    type Message = R;
    type Functor = RankFunctor<V, R>;

    const KIND: AlgorithmKind = AlgorithmKind::RankPropagation;
    const NEEDS_SOURCE: bool = false;

    fn validate(&self, config: &RunConfig) -> Result<()> {
        config.validate()?;
        if config.algorithm != Self::KIND {
            return Err(FrontierError::InvalidConfig(format!(
                "rank propagation cannot run a {} configuration",
                config.algorithm
            )));
        }
        Ok(())
    }

    fn functor(&self, config: &RunConfig, node_count: usize) -> Self::Functor {
        RankFunctor::new(
            config.damping_factor,
            config.convergence_threshold,
            node_count,
        )
    }

    fn state_bytes(&self, local_count: usize) -> usize {
        4 * local_count * std::mem::size_of::<R>()
    }

    fn allocate(&self, partition: &Partition<V, S>) -> Self::State {
        let n = partition.local_count();
        let zeros = || (0..n).map(|_| R::new_atomic(R::zero())).collect::<Vec<_>>();
        RankState {
            rank: zeros(),
            sent: zeros(),
            pending: zeros(),
            acc: zeros(),
            dangling: Arc::clone(&self.dangling),
            seen_dangling: R::new_atomic(R::zero()),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn reset(
        &self,
        state: &Self::State,
        partition: &Partition<V, S>,
        node_count: usize,
        _source: Option<usize>,
    ) -> Vec<V> {
        let initial = R::from_f64(1.0 / node_count.max(1) as f64);
        state
            .rank
            .par_iter()
            .for_each(|r| R::store(r, initial));
        for column in [&state.sent, &state.pending, &state.acc] {
            column.par_iter().for_each(|r| R::store(r, R::zero()));
        }
        R::store(&state.dangling, R::zero());
        R::store(&state.seen_dangling, R::zero());

        (0..partition.owned_count()).map(local_id).collect()
    }

    fn unique_frontier(&self) -> bool {
        true
    }

    fn pack(&self, state: &Self::State, local: usize) -> Self::Message {
        R::swap(&state.acc[local], R::zero())
    }

    fn merge(
        &self,
        functor: &Self::Functor,
        state: &Self::State,
        local: usize,
        delta: Self::Message,
        iteration: u32,
    ) -> bool {
        R::fetch_add(&state.acc[local], delta);
        functor.cond_filter(state, local, iteration)
    }

    fn needs_refresh(&self, state: &Self::State, iteration: u32) -> bool {
        let dangling = R::load(&state.dangling);
        let seen = R::swap(&state.seen_dangling, dangling);
        iteration == 0 || !dangling.bits_eq(seen)
    }

    fn finalized(&self, _state: &Self::State, owned: usize) -> usize {
        owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionPlan, PartitionStrategy};
    use crate::storage::GraphTopology;

    type PageRank = RankPropagation<u32, u32, f64>;

    fn partition(edges: &[(u32, u32)], n: usize) -> Partition<u32, u32> {
        let graph = GraphTopology::from_edge_list(n, edges).unwrap();
        PartitionPlan::new(&graph, 1, PartitionStrategy::Contiguous)
            .unwrap()
            .into_parts()
            .0
            .remove(0)
    }

    fn edge(src: usize, dst: usize, degree: usize) -> EdgeRef<u32> {
        EdgeRef {
            src,
            dst,
            src_id: u32::try_from(src).unwrap(),
            src_degree: degree,
        }
    }

    #[test]
    fn test_reset_seeds_every_owned_vertex() {
        let algorithm = PageRank::new();
        let part = partition(&[(0, 1), (1, 2)], 4);
        let state = algorithm.allocate(&part);
        let seeds = algorithm.reset(&state, &part, 4, None);
        assert_eq!(seeds, vec![0, 1, 2, 3]);
        assert!((state.rank(3) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_push_moves_delta_once() {
        let algorithm = PageRank::new();
        let part = partition(&[(0, 1), (0, 2)], 3);
        let state = algorithm.allocate(&part);
        algorithm.reset(&state, &part, 3, None);
        let functor = RankFunctor::<u32, f64>::new(0.85, 1e-6, 3);

        functor.apply_source(&state, 0, 2, 0);
        assert!(functor.cond_edge(&state, &edge(0, 1, 2), 0));
        functor.apply_edge(&state, &edge(0, 1, 2), 0);
        functor.apply_edge(&state, &edge(0, 2, 2), 0);
        assert!((f64::load(&state.acc[1]) - 1.0 / 6.0).abs() < 1e-12);

        // Second push of an unchanged rank carries nothing
        functor.apply_source(&state, 0, 2, 1);
        assert!(!functor.cond_edge(&state, &edge(0, 1, 2), 1));
    }

    #[test]
    fn test_dangling_mass_shared() {
        let algorithm = PageRank::new();
        let part = partition(&[(0, 1)], 2);
        let state = algorithm.allocate(&part);
        algorithm.reset(&state, &part, 2, None);
        let functor = RankFunctor::<u32, f64>::new(0.85, 1e-6, 2);

        functor.apply_source(&state, 1, 0, 0);
        assert!((state.dangling_mass() - 0.5).abs() < 1e-12);
        assert!((f64::load(&algorithm.dangling) - 0.5).abs() < 1e-12);

        assert!(algorithm.needs_refresh(&state, 1));
        assert!(!algorithm.needs_refresh(&state, 2));
    }

    #[test]
    fn test_filter_threshold() {
        let algorithm = PageRank::new();
        let part = partition(&[(0, 1), (1, 0)], 2);
        let state = algorithm.allocate(&part);
        algorithm.reset(&state, &part, 2, None);
        let functor = RankFunctor::<u32, f64>::new(0.85, 0.01, 2);

        // Symmetric pair: each vertex receives exactly its own rank back
        for v in 0..2 {
            functor.apply_source(&state, v, 1, 0);
        }
        functor.apply_edge(&state, &edge(0, 1, 1), 0);
        functor.apply_edge(&state, &edge(1, 0, 1), 0);
        assert!(!functor.cond_filter(&state, 0, 0));
        assert!((state.rank(0) - 0.5).abs() < 1e-12);

        // An injected delta above the threshold reactivates the vertex
        assert!(algorithm.merge(&functor, &state, 1, 0.1, 0));
        assert!(state.rank(1) > 0.5);
    }
}
