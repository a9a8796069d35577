//! Filter phase: compact the Advance output into the next frontier
//!
//! Owned candidates are kept if they pass `cond_filter`. Ghost candidates
//! leave the frontier and are packed into the outbox for their owner.

use super::advance::VERTEX_GRAIN;
use crate::error::{FrontierError, Phase, Result};
use crate::functor::Functor;
use crate::problem::{Algorithm, DataSlice, Outgoing};
use crate::types::VertexId;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Work done by one device in one Filter
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FilterWork {
    /// Advance output entries examined
    pub(crate) candidates: usize,
    pub(crate) kept: usize,
    /// Candidates dropped as repeats of an earlier one
    pub(crate) duplicates: usize,
    /// Ghost candidates packed for their owner
    pub(crate) remote: usize,
    pub(crate) busy: Duration,
}

type Compacted<V, M> = (Vec<V>, Vec<Outgoing<M>>, usize);

/// Replace the output queue of `slice` with its surviving candidates
pub(crate) fn filter<A: Algorithm>(
    slice: &mut DataSlice<A>,
    algorithm: &A,
    functor: &A::Functor,
    iteration: u32,
) -> Result<FilterWork> {
    let started = Instant::now();
    let partition = &slice.partition;
    let state = &slice.state;
    let scratch = &slice.scratch;
    let candidates = slice.frontier.output();

    let dedupe = algorithm.unique_frontier()
        || algorithm.suppresses_duplicates()
        || partition.ghost_count() > 0;
    if dedupe {
        scratch.clear_all();
    }

    let compacted: Vec<Compacted<A::Vertex, A::Message>> = candidates
        .par_chunks(VERTEX_GRAIN)
        .map(|chunk| {
            let mut kept = Vec::with_capacity(chunk.len());
            let mut outgoing = Vec::new();
            let mut duplicates = 0;
            for &candidate in chunk {
                let v = candidate.index();
                if dedupe && !scratch.test_and_set(v) {
                    duplicates += 1;
                    continue;
                }
                if let Some(route) = partition.route(v) {
                    outgoing.push(Outgoing {
                        partition: route.partition,
                        local: route.local,
                        message: algorithm.pack(state, v),
                    });
                } else if functor.cond_filter(state, v, iteration) {
                    functor.apply_filter(state, v, iteration);
                    kept.push(candidate);
                }
            }
            (kept, outgoing, duplicates)
        })
        .collect();

    let mut work = FilterWork {
        candidates: candidates.len(),
        ..FilterWork::default()
    };
    let mut chunks = Vec::with_capacity(compacted.len());
    slice.outbox.clear();
    for (kept, outgoing, duplicates) in compacted {
        work.kept += kept.len();
        work.remote += outgoing.len();
        work.duplicates += duplicates;
        slice.outbox.extend(outgoing);
        chunks.push(kept);
    }

    slice
        .frontier
        .write_output(&chunks)
        .map_err(|err| FrontierError::Overflowed {
            device: slice.device.id(),
            phase: Phase::Filter,
            iteration,
            required: err.required,
            capacity: err.capacity,
        })?;

    work.busy = started.elapsed();
    Ok(work)
}
