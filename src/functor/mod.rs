//! Per-edge and per-vertex kernels
//!
//! A [`Functor`] is the algorithm policy the enactor calls from its
//! data-parallel phases. It only touches the state slice it is handed and
//! never sees the frontier or the device.
//!
//! - `apply_source`: once per frontier vertex, before its edges are expanded
//! - `cond_edge` / `apply_edge`: per out-edge of a frontier vertex; edges that
//!   pass `cond_edge` put their destination into the next frontier
//! - `cond_filter` / `apply_filter`: per candidate vertex during compaction

pub mod rank;
pub mod traversal;

pub use rank::{RankFunctor, RankPropagation, RankState};
pub use traversal::{TraversalFunctor, TraversalLabel, TraversalOptions, TraversalState};

use crate::types::VertexId;

/// Edge handed to the edge kernels
///
/// `src` and `dst` are local ids within the partition, `src_id` is the
/// global id of the source vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef<V> {
    /// Local source id
    pub src: usize,
    /// Local destination id
    pub dst: usize,
    /// Global source id
    pub src_id: V,
    /// Out-degree of the source
    pub src_degree: usize,
}

/// Algorithm kernels run inside the Advance and Filter phases
///
/// Implementations must be safe to call concurrently for different (and,
/// for `cond_edge`, identical) vertices; state mutation goes through atomics.
pub trait Functor: Send + Sync {
    /// Vertex id width
    type Vertex: VertexId;

    /// Per-partition vertex state
    type State: Send + Sync;

    /// Prologue for a frontier vertex before its edges are expanded
    fn apply_source(&self, _state: &Self::State, _v: usize, _degree: usize, _iteration: u32) {}

    /// Whether the edge produces work for its destination
    fn cond_edge(&self, state: &Self::State, edge: &EdgeRef<Self::Vertex>, iteration: u32) -> bool;

    /// Update applied for every edge that passed `cond_edge`
    fn apply_edge(&self, state: &Self::State, edge: &EdgeRef<Self::Vertex>, iteration: u32);

    /// Whether an owned candidate stays in the next frontier
    fn cond_filter(&self, state: &Self::State, v: usize, iteration: u32) -> bool;

    /// Update applied for every candidate that passed `cond_filter`
    fn apply_filter(&self, _state: &Self::State, _v: usize, _iteration: u32) {}
}
