//! Exchange phase: deliver ghost work to owners and swap frontiers
//!
//! Routing runs on the host between the Filter and Exchange barriers, in
//! partition order, so the merge order on every owner is deterministic.

use crate::error::{FrontierError, Phase, Result};
use crate::functor::Functor;
use crate::partition::local_id;
use crate::problem::{Algorithm, DataSlice};
use crate::types::VertexId;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Work done by one device in one Exchange
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExchangeWork {
    /// Inbox messages that put their vertex into the next frontier
    pub(crate) merged: usize,
    /// Owned vertices re-entering after a full refresh
    pub(crate) refreshed: usize,
    /// Size of the next frontier
    pub(crate) next: usize,
    pub(crate) busy: Duration,
}

/// Move every outbox entry into its owner's inbox; returns the message count
pub(crate) fn route_messages<A: Algorithm>(slices: &mut [DataSlice<A>]) -> usize {
    let mut routed = 0;
    for i in 0..slices.len() {
        let mut outbox = std::mem::take(&mut slices[i].outbox);
        for outgoing in outbox.drain(..) {
            slices[outgoing.partition]
                .inbox
                .push((outgoing.local, outgoing.message));
            routed += 1;
        }
        slices[i].outbox = outbox;
    }
    routed
}

/// Merge the inbox, refresh if the algorithm asks for it, then swap
pub(crate) fn exchange<A: Algorithm>(
    slice: &mut DataSlice<A>,
    algorithm: &A,
    functor: &A::Functor,
    iteration: u32,
) -> Result<ExchangeWork> {
    let started = Instant::now();
    let refresh = algorithm.needs_refresh(&slice.state, iteration);
    let mut work = ExchangeWork::default();

    if !slice.inbox.is_empty() || refresh {
        slice.scratch.clear_all();
        for v in slice.frontier.output() {
            slice.scratch.set(v.index());
        }
    }

    let overflow = |device: usize, err: crate::frontier::CapacityExceeded| {
        FrontierError::Overflowed {
            device,
            phase: Phase::Exchange,
            iteration,
            required: err.required,
            capacity: err.capacity,
        }
    };

    if !slice.inbox.is_empty() {
        let mut inbox = std::mem::take(&mut slice.inbox);
        let mut accepted = Vec::new();
        for (local, message) in inbox.drain(..) {
            if algorithm.merge(functor, &slice.state, local, message, iteration)
                && slice.scratch.test_and_set(local)
            {
                accepted.push(local_id::<A::Vertex>(local));
            }
        }
        slice.inbox = inbox;
        work.merged = accepted.len();
        slice
            .frontier
            .append_output(&accepted)
            .map_err(|err| overflow(slice.device.id(), err))?;
    }

    if refresh {
        let state = &slice.state;
        let scratch = &slice.scratch;
        let reentered: Vec<A::Vertex> = (0..slice.partition.owned_count())
            .into_par_iter()
            .filter(|&v| functor.cond_filter(state, v, iteration) && scratch.test_and_set(v))
            .map(local_id::<A::Vertex>)
            .collect();
        work.refreshed = reentered.len();
        slice
            .frontier
            .append_output(&reentered)
            .map_err(|err| overflow(slice.device.id(), err))?;
    }

    slice.frontier.swap();
    work.next = slice.frontier.len();
    work.busy = started.elapsed();
    Ok(work)
}
