//! Traversal labeling (breadth-first hop counts)
//!
//! Every vertex reachable from the source gets its hop distance as a label,
//! optionally with the vertex it was first reached from. Exactly one incoming
//! edge wins the right to label a vertex: either through an atomic
//! compare-exchange on the label, or, with duplicate suppression, through a
//! visited bitmap.

use super::{EdgeRef, Functor};
use crate::bitset::AtomicBitset;
use crate::config::{AlgorithmKind, RunConfig};
use crate::error::{FrontierError, Result};
use crate::partition::{local_id, Partition};
use crate::problem::Algorithm;
use crate::types::{Label, SizeT, VertexId};
use rayon::prelude::*;
use std::marker::PhantomData;

/// Options fixed when the traversal state is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalOptions {
    /// Record the predecessor of every labeled vertex
    pub track_predecessors: bool,
    /// Use a visited bitmap to keep duplicates out of the frontier
    pub suppress_duplicates: bool,
}

impl TraversalOptions {
    /// Options requested by a run configuration
    #[must_use]
    pub const fn from_config(config: &RunConfig) -> Self {
        Self {
            track_predecessors: config.track_predecessors,
            suppress_duplicates: config.suppress_duplicates,
        }
    }

    /// Reject option combinations that cannot run together
    ///
    /// The visited bitmap admits the first edge to reach a vertex without an
    /// atomic label claim, so the recorded predecessor would not match the
    /// winning edge.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleOptions` if both options are enabled
    pub fn validate(&self) -> Result<()> {
        if self.track_predecessors && self.suppress_duplicates {
            return Err(FrontierError::IncompatibleOptions(
                "duplicate suppression cannot be combined with predecessor tracking",
            ));
        }
        Ok(())
    }
}

/// Per-partition traversal state
#[derive(Debug)]
pub struct TraversalState<V: VertexId, L: Label> {
    labels: Vec<L::Atomic>,
    predecessors: Option<Vec<V::Atomic>>,
    visited: Option<AtomicBitset>,
}

impl<V: VertexId, L: Label> TraversalState<V, L> {
    /// Label of a local vertex
    #[must_use]
    pub fn label(&self, local: usize) -> L {
        L::load(&self.labels[local])
    }

    /// Predecessor (global id) of a local vertex, `None` without tracking
    #[must_use]
    pub fn predecessor(&self, local: usize) -> Option<V> {
        self.predecessors.as_ref().map(|p| V::load(&p[local]))
    }

    /// Whether predecessors are recorded
    #[must_use]
    pub const fn tracks_predecessors(&self) -> bool {
        self.predecessors.is_some()
    }
}

/// Edge and filter kernels of traversal labeling
#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalFunctor<V, L> {
    _marker: PhantomData<fn() -> (V, L)>,
}

impl<V: VertexId, L: Label> TraversalFunctor<V, L> {
    fn next_label(state: &TraversalState<V, L>, src: usize) -> L {
        L::load(&state.labels[src]).saturating_add(L::one())
    }
}

impl<V: VertexId, L: Label> Functor for TraversalFunctor<V, L> {
    type Vertex = V;
    type State = TraversalState<V, L>;

    fn cond_edge(&self, state: &Self::State, edge: &EdgeRef<V>, _iteration: u32) -> bool {
        match &state.visited {
            Some(visited) => visited.test_and_set(edge.dst),
            None => L::claim(&state.labels[edge.dst], Self::next_label(state, edge.src)),
        }
    }

    fn apply_edge(&self, state: &Self::State, edge: &EdgeRef<V>, _iteration: u32) {
        L::store(&state.labels[edge.dst], Self::next_label(state, edge.src));
        if let Some(predecessors) = &state.predecessors {
            V::store(&predecessors[edge.dst], edge.src_id);
        }
    }

    fn cond_filter(&self, state: &Self::State, v: usize, iteration: u32) -> bool {
        L::load(&state.labels[v]) == L::from_depth(iteration.saturating_add(1))
    }
}

/// Traversal-labeling primitive
///
/// `V` vertex ids, `S` row offsets, `L` labels.
#[derive(Debug, Clone, Copy)]
pub struct TraversalLabel<V, S, L> {
    options: TraversalOptions,
    _marker: PhantomData<fn() -> (V, S, L)>,
}

impl<V: VertexId, S: SizeT, L: Label> TraversalLabel<V, S, L> {
    /// Traversal with the given options
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleOptions` for suppression combined with tracking
    pub fn new(options: TraversalOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            _marker: PhantomData,
        })
    }

    /// Options the state is allocated for
    #[must_use]
    pub const fn options(&self) -> TraversalOptions {
        self.options
    }
}

impl<V: VertexId, S: SizeT, L: Label> Algorithm for TraversalLabel<V, S, L> {
    type Vertex = V;
    type Offset = S;
    type State = TraversalState<V, L>;
    type Message = (L, V);
    type Functor = TraversalFunctor<V, L>;

    const KIND: AlgorithmKind = AlgorithmKind::TraversalLabel;
    const NEEDS_SOURCE: bool = true;

    fn validate(&self, config: &RunConfig) -> Result<()> {
        config.validate()?;
        if config.algorithm != Self::KIND {
            return Err(FrontierError::InvalidConfig(format!(
                "traversal labeling cannot run a {} configuration",
                config.algorithm
            )));
        }
        if TraversalOptions::from_config(config) != self.options {
            return Err(FrontierError::InvalidConfig(format!(
                "traversal options are fixed at init ({:?}); reset requested {:?}",
                self.options,
                TraversalOptions::from_config(config)
            )));
        }
        Ok(())
    }

    fn functor(&self, _config: &RunConfig, _node_count: usize) -> Self::Functor {
        TraversalFunctor::default()
    }

    fn state_bytes(&self, local_count: usize) -> usize {
        let mut bytes = local_count * std::mem::size_of::<L>();
        if self.options.track_predecessors {
            bytes += local_count * std::mem::size_of::<V>();
        }
        if self.options.suppress_duplicates {
            bytes += AtomicBitset::bytes_for(local_count);
        }
        bytes
    }

    fn allocate(&self, partition: &Partition<V, S>) -> Self::State {
        let n = partition.local_count();
        TraversalState {
            labels: (0..n).map(|_| L::new_atomic(L::UNVISITED)).collect(),
            predecessors: self
                .options
                .track_predecessors
                .then(|| (0..n).map(|_| V::new_atomic(V::INVALID)).collect()),
            visited: self
                .options
                .suppress_duplicates
                .then(|| AtomicBitset::new(n)),
        }
    }

    fn reset(
        &self,
        state: &Self::State,
        _partition: &Partition<V, S>,
        _node_count: usize,
        source: Option<usize>,
    ) -> Vec<V> {
        state
            .labels
            .par_iter()
            .for_each(|label| L::store(label, L::UNVISITED));
        if let Some(predecessors) = &state.predecessors {
            predecessors
                .par_iter()
                .for_each(|p| V::store(p, V::INVALID));
        }
        if let Some(visited) = &state.visited {
            visited.clear_all();
        }

        source.map_or_else(Vec::new, |src| {
            L::store(&state.labels[src], L::zero());
            if let Some(visited) = &state.visited {
                visited.set(src);
            }
            vec![local_id(src)]
        })
    }

    fn pack(&self, state: &Self::State, local: usize) -> Self::Message {
        (
            state.label(local),
            state.predecessor(local).unwrap_or(V::INVALID),
        )
    }

    fn merge(
        &self,
        _functor: &Self::Functor,
        state: &Self::State,
        local: usize,
        (label, predecessor): Self::Message,
        _iteration: u32,
    ) -> bool {
        let won = match &state.visited {
            Some(visited) => {
                let first = visited.test_and_set(local);
                if first {
                    L::store(&state.labels[local], label);
                }
                first
            }
            None => L::claim(&state.labels[local], label),
        };
        if won {
            if let Some(predecessors) = &state.predecessors {
                V::store(&predecessors[local], predecessor);
            }
        }
        won
    }

    fn finalized(&self, state: &Self::State, owned: usize) -> usize {
        state.labels[..owned]
            .par_iter()
            .filter(|label| L::load(label) != L::UNVISITED)
            .count()
    }

    fn suppresses_duplicates(&self) -> bool {
        self.options.suppress_duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionPlan, PartitionStrategy};
    use crate::storage::GraphTopology;

    type Bfs = TraversalLabel<u32, u32, i32>;

    fn single_partition() -> Partition<u32, u32> {
        let graph = GraphTopology::from_edge_list(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
        let plan = PartitionPlan::new(&graph, 1, PartitionStrategy::Contiguous).unwrap();
        plan.into_parts().0.remove(0)
    }

    fn edge(src: usize, dst: usize) -> EdgeRef<u32> {
        EdgeRef {
            src,
            dst,
            src_id: u32::try_from(src).unwrap(),
            src_degree: 1,
        }
    }

    #[test]
    fn test_incompatible_options_at_construction() {
        let options = TraversalOptions {
            track_predecessors: true,
            suppress_duplicates: true,
        };
        assert!(matches!(
            Bfs::new(options),
            Err(FrontierError::IncompatibleOptions(_))
        ));
    }

    #[test]
    fn test_claim_admits_one_edge() {
        let algorithm = Bfs::new(TraversalOptions {
            track_predecessors: true,
            suppress_duplicates: false,
        })
        .unwrap();
        let partition = single_partition();
        let state = algorithm.allocate(&partition);
        let seeds = algorithm.reset(&state, &partition, 3, Some(0));
        assert_eq!(seeds, vec![0]);

        let functor = algorithm.functor(&RunConfig::default(), 3);
        assert!(functor.cond_edge(&state, &edge(0, 2), 0));
        functor.apply_edge(&state, &edge(0, 2), 0);
        assert!(!functor.cond_edge(&state, &edge(1, 2), 0));

        assert_eq!(state.label(2), 1);
        assert_eq!(state.predecessor(2), Some(0));
        assert!(functor.cond_filter(&state, 2, 0));
        assert!(!functor.cond_filter(&state, 0, 0));
    }

    #[test]
    fn test_visited_bitmap_admits_one_edge() {
        let algorithm = Bfs::new(TraversalOptions {
            track_predecessors: false,
            suppress_duplicates: true,
        })
        .unwrap();
        let partition = single_partition();
        let state = algorithm.allocate(&partition);
        algorithm.reset(&state, &partition, 3, Some(0));

        let functor = algorithm.functor(&RunConfig::default(), 3);
        assert!(!functor.cond_edge(&state, &edge(1, 0), 0));
        assert!(functor.cond_edge(&state, &edge(0, 1), 0));
        assert!(!functor.cond_edge(&state, &edge(0, 1), 0));
        assert_eq!(state.predecessor(1), None);
    }

    #[test]
    fn test_merge_first_writer_wins() {
        let algorithm = Bfs::new(TraversalOptions {
            track_predecessors: true,
            suppress_duplicates: false,
        })
        .unwrap();
        let partition = single_partition();
        let state = algorithm.allocate(&partition);
        algorithm.reset(&state, &partition, 3, None);
        let functor = algorithm.functor(&RunConfig::default(), 3);

        assert!(algorithm.merge(&functor, &state, 1, (2, 7), 1));
        assert!(!algorithm.merge(&functor, &state, 1, (2, 9), 1));
        assert_eq!(state.predecessor(1), Some(7));
        assert_eq!(algorithm.finalized(&state, 3), 1);
    }

    #[test]
    fn test_reset_option_mismatch() {
        let algorithm = Bfs::new(TraversalOptions::default()).unwrap();
        let config = RunConfig::traversal(0).with_predecessors(true);
        assert!(matches!(
            algorithm.validate(&config),
            Err(FrontierError::InvalidConfig(_))
        ));
        assert!(algorithm.validate(&RunConfig::traversal(0)).is_ok());
    }
}
