//! Advance phase: expand the out-edges of every frontier vertex
//!
//! Load balancing decides how edge work is split across workers:
//!
//! - thread-per-vertex: frontier vertices are chunked, each worker walks the
//!   full adjacency list of its vertices. Cheap bookkeeping, but one hub
//!   vertex serializes on a single worker.
//! - edge-balanced: a prefix sum over the frontier's out-degrees maps the
//!   total edge range onto equal-sized chunks; each chunk binary-searches its
//!   first vertex, so a hub's edges are spread over many workers.

use crate::error::{FrontierError, Phase, Result};
use crate::functor::{EdgeRef, Functor};
use crate::partition::Partition;
use crate::problem::{Algorithm, DataSlice};
use crate::types::{SizeT, VertexId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::{Duration, Instant};

/// Frontier edge count from which `Auto` switches to edge-balanced advance
pub const AUTO_EDGE_THRESHOLD: usize = 4096;

/// Frontier vertices per thread-per-vertex task
pub(crate) const VERTEX_GRAIN: usize = 64;

/// Minimum edges per edge-balanced task
const EDGE_GRAIN: usize = 1024;

/// Advance load-balancing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStrategy {
    /// One task per chunk of frontier vertices
    ThreadPerVertex,
    /// Equal-sized chunks of the frontier's total edge range
    EdgeBalanced,
    /// Edge-balanced once the frontier carries `AUTO_EDGE_THRESHOLD` edges
    #[default]
    Auto,
}

impl AdvanceStrategy {
    /// Concrete strategy for a frontier with `edges` outgoing edges
    #[must_use]
    pub const fn resolve(self, edges: usize) -> Self {
        match self {
            Self::Auto if edges >= AUTO_EDGE_THRESHOLD => Self::EdgeBalanced,
            Self::Auto => Self::ThreadPerVertex,
            other => other,
        }
    }
}

/// Work done by one device in one Advance
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AdvanceWork {
    /// Out-edges of the frontier that were expanded
    pub(crate) edges: usize,
    /// Work items written to the output queue
    pub(crate) queued: usize,
    pub(crate) busy: Duration,
}

struct Expand<'a, F: Functor, S> {
    functor: &'a F,
    state: &'a F::State,
    partition: &'a Partition<F::Vertex, S>,
    iteration: u32,
}

impl<F: Functor, S: SizeT> Expand<'_, F, S> {
    /// Run the edge kernels over `within` (relative to the row start) of `u`'s edges
    fn row(&self, u: usize, within: Range<usize>, out: &mut Vec<F::Vertex>) {
        let neighbors = self.partition.topology().neighbors(u);
        let src_id = self.partition.global_id(u);
        for dst in &neighbors[within] {
            let edge = EdgeRef {
                src: u,
                dst: dst.index(),
                src_id,
                src_degree: neighbors.len(),
            };
            if self.functor.cond_edge(self.state, &edge, self.iteration) {
                self.functor.apply_edge(self.state, &edge, self.iteration);
                out.push(*dst);
            }
        }
    }
}

/// Expand the input frontier of `slice` into its output queue
pub(crate) fn advance<A: Algorithm>(
    slice: &mut DataSlice<A>,
    functor: &A::Functor,
    strategy: AdvanceStrategy,
    iteration: u32,
) -> Result<AdvanceWork> {
    let started = Instant::now();
    let input = slice.frontier.input();
    let topology = slice.partition.topology();
    let state = &slice.state;

    input.par_iter().for_each(|u| {
        let u = u.index();
        functor.apply_source(state, u, topology.out_degree(u), iteration);
    });

    let mut offsets = Vec::with_capacity(input.len() + 1);
    offsets.push(0_usize);
    for u in input {
        let last = offsets[offsets.len() - 1];
        offsets.push(last + topology.out_degree(u.index()));
    }
    let total = offsets[input.len()];

    let expand = Expand {
        functor,
        state,
        partition: &slice.partition,
        iteration,
    };

    let chunks: Vec<Vec<A::Vertex>> = match strategy.resolve(total) {
        AdvanceStrategy::EdgeBalanced if total > 0 => {
            let grain = total
                .div_ceil(rayon::current_num_threads() * 4)
                .max(EDGE_GRAIN);
            (0..total.div_ceil(grain))
                .into_par_iter()
                .map(|chunk| {
                    let begin = chunk * grain;
                    let end = (begin + grain).min(total);
                    let mut out = Vec::new();
                    for (i, within) in segments(&offsets, begin, end) {
                        expand.row(input[i].index(), within, &mut out);
                    }
                    out
                })
                .collect()
        }
        _ => input
            .par_chunks(VERTEX_GRAIN)
            .map(|vertices| {
                let mut out = Vec::new();
                for u in vertices {
                    let u = u.index();
                    expand.row(u, 0..topology.out_degree(u), &mut out);
                }
                out
            })
            .collect(),
    };

    let queued = chunks.iter().map(Vec::len).sum();
    slice
        .frontier
        .write_output(&chunks)
        .map_err(|err| FrontierError::Overflowed {
            device: slice.device.id(),
            phase: Phase::Advance,
            iteration,
            required: err.required,
            capacity: err.capacity,
        })?;

    Ok(AdvanceWork {
        edges: total,
        queued,
        busy: started.elapsed(),
    })
}

/// Frontier positions and row-relative edge ranges covering `begin..end`
///
/// `offsets` is the exclusive prefix sum of the frontier's out-degrees
/// (length `frontier + 1`). Empty rows are skipped.
fn segments(offsets: &[usize], begin: usize, end: usize) -> Vec<(usize, Range<usize>)> {
    let rows = offsets.len().saturating_sub(1);
    let mut i = offsets.partition_point(|&o| o <= begin).saturating_sub(1);
    let mut out = Vec::new();
    while i < rows && offsets[i] < end {
        let lo = begin.max(offsets[i]) - offsets[i];
        let hi = end.min(offsets[i + 1]) - offsets[i];
        if lo < hi {
            out.push((i, lo..hi));
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolution() {
        assert_eq!(
            AdvanceStrategy::Auto.resolve(AUTO_EDGE_THRESHOLD - 1),
            AdvanceStrategy::ThreadPerVertex
        );
        assert_eq!(
            AdvanceStrategy::Auto.resolve(AUTO_EDGE_THRESHOLD),
            AdvanceStrategy::EdgeBalanced
        );
        assert_eq!(
            AdvanceStrategy::ThreadPerVertex.resolve(1 << 20),
            AdvanceStrategy::ThreadPerVertex
        );
    }

    #[test]
    fn test_segments_split_hub_row() {
        // Degrees: 2, 0, 10, 1
        let offsets = [0, 2, 2, 12, 13];
        assert_eq!(segments(&offsets, 0, 4), vec![(0, 0..2), (2, 0..2)]);
        assert_eq!(segments(&offsets, 4, 8), vec![(2, 2..6)]);
        assert_eq!(segments(&offsets, 8, 13), vec![(2, 6..10), (3, 0..1)]);
    }

    #[test]
    fn test_segments_cover_every_edge_once() {
        let offsets = [0, 3, 3, 3, 7, 8, 20];
        let total = offsets[offsets.len() - 1];
        let mut seen = vec![0; total];
        for begin in (0..total).step_by(5) {
            for (i, within) in segments(&offsets, begin, (begin + 5).min(total)) {
                for e in within {
                    seen[offsets[i] + e] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }
}
