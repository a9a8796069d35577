//! Enactor: the bulk-synchronous iteration loop
//!
//! One iteration runs Advance and Filter on every device, routes ghost work
//! to its owners on the host, then runs Exchange (merge, refresh, swap) on
//! every device. Each phase ends with a barrier across devices.
//!
//! ```text
//! Idle ──enact──▶ Running ──┬─▶ Converged
//!                           ├─▶ MaxIterationsReached
//!                           ├─▶ Overflowed   (error, retry with larger queues)
//!                           └─▶ Failed       (fault or cancellation)
//! ```

pub mod advance;
pub(crate) mod exchange;
pub(crate) mod filter;

pub use advance::{AdvanceStrategy, AUTO_EDGE_THRESHOLD};

use crate::context::run_on_devices;
use crate::error::{FrontierError, Phase, Result};
use crate::problem::{Algorithm, Problem, RunParts};
use crate::stats::{RunReport, Statistics, StatsCollector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The frontier became empty on every device
    Converged,
    /// The iteration limit was reached with work still queued
    MaxIterationsReached,
}

/// State of the enactor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnactorState {
    /// No run yet
    #[default]
    Idle,
    /// Iterating
    Running,
    /// Last run converged
    Converged,
    /// Last run hit the iteration limit
    MaxIterationsReached,
    /// Last run overflowed a frontier
    Overflowed,
    /// Last run hit a device fault or was cancelled
    Failed,
}

/// Cooperative cancellation, checked between phases
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the run stops before its next phase
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Drives a [`Problem`] to termination
#[derive(Debug, Default)]
pub struct Enactor {
    strategy: AdvanceStrategy,
    state: EnactorState,
    cancel: CancelToken,
    stats: Option<StatsCollector>,
}

impl Enactor {
    /// Enactor using `strategy` for Advance
    #[must_use]
    pub fn new(strategy: AdvanceStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Share a cancel token with the caller
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels runs of this enactor
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EnactorState {
        self.state
    }

    /// Advance strategy
    #[must_use]
    pub const fn strategy(&self) -> AdvanceStrategy {
        self.strategy
    }

    /// Run `problem` until its frontier empties or the iteration limit is hit
    ///
    /// # Errors
    ///
    /// - `NotReady` unless the problem was reset since its last run
    /// - `Overflowed` if a phase produced more items than the frontier holds;
    ///   reset with a larger queue sizing factor and run again
    /// - `DeviceFault` if a device failed; the problem must be reset
    /// - `Cancelled` if the cancel token fired
    pub fn enact<A: Algorithm>(&mut self, problem: &mut Problem<A>) -> Result<Termination> {
        let span = tracing::info_span!(
            "enact",
            algorithm = %A::KIND,
            devices = problem.device_count(),
            vertices = problem.node_count(),
        );
        let _entered = span.enter();

        let outcome = {
            let parts = problem.run_parts()?;
            self.state = EnactorState::Running;
            self.iterate(parts)
        };
        problem.finish(&outcome);

        self.state = match &outcome {
            Ok(Termination::Converged) => EnactorState::Converged,
            Ok(Termination::MaxIterationsReached) => EnactorState::MaxIterationsReached,
            Err(FrontierError::Overflowed { .. }) => EnactorState::Overflowed,
            Err(_) => EnactorState::Failed,
        };

        let iterations = self.stats.as_ref().map_or(0, StatsCollector::iterations);
        match &outcome {
            Ok(termination) => tracing::info!(?termination, iterations, "enact finished"),
            Err(err) => tracing::warn!(error = %err, iterations, "enact failed"),
        }
        outcome
    }

    fn iterate<A: Algorithm>(&mut self, parts: RunParts<'_, A>) -> Result<Termination> {
        let RunParts {
            algorithm,
            functor,
            slices,
            max_iterations,
        } = parts;
        let mut stats = StatsCollector::new(slices.len());
        let mut iteration = 0_u32;

        let outcome = loop {
            let frontier: usize = slices.iter().map(|s| s.frontier.len()).sum();
            if frontier == 0 {
                break Ok(Termination::Converged);
            }
            if iteration >= max_iterations {
                break Ok(Termination::MaxIterationsReached);
            }
            stats.begin_iteration(frontier);
            if let Err(err) = self.step(algorithm, functor, slices, iteration, &mut stats) {
                break Err(err);
            }
            iteration += 1;
        };

        stats.finish();
        self.stats = Some(stats);
        outcome
    }

    fn step<A: Algorithm>(
        &self,
        algorithm: &A,
        functor: &A::Functor,
        slices: &mut [crate::problem::DataSlice<A>],
        iteration: u32,
        stats: &mut StatsCollector,
    ) -> Result<()> {
        let strategy = self.strategy;

        self.check_cancel(Phase::Advance, iteration)?;
        let advanced = run_on_devices(slices, Phase::Advance, iteration, |slice| {
            advance::advance(slice, functor, strategy, iteration)
        })?;
        for (device, work) in advanced.iter().enumerate() {
            stats.record_advance(device, work.edges, work.queued, work.busy);
        }

        self.check_cancel(Phase::Filter, iteration)?;
        let filtered = run_on_devices(slices, Phase::Filter, iteration, |slice| {
            filter::filter(slice, algorithm, functor, iteration)
        })?;
        for (device, work) in filtered.iter().enumerate() {
            stats.record_filter(device, work.busy);
        }

        self.check_cancel(Phase::Exchange, iteration)?;
        let routed = exchange::route_messages(slices);
        let exchanged = run_on_devices(slices, Phase::Exchange, iteration, |slice| {
            exchange::exchange(slice, algorithm, functor, iteration)
        })?;
        for (device, work) in exchanged.iter().enumerate() {
            stats.record_exchange(device, work.busy);
        }
        stats.end_iteration(routed);

        tracing::debug!(
            iteration,
            edges = advanced.iter().map(|w| w.edges).sum::<usize>(),
            queued = advanced.iter().map(|w| w.queued).sum::<usize>(),
            candidates = filtered.iter().map(|w| w.candidates).sum::<usize>(),
            duplicates = filtered.iter().map(|w| w.duplicates).sum::<usize>(),
            kept = filtered.iter().map(|w| w.kept).sum::<usize>(),
            remote = filtered.iter().map(|w| w.remote).sum::<usize>(),
            merged = exchanged.iter().map(|w| w.merged).sum::<usize>(),
            refreshed = exchanged.iter().map(|w| w.refreshed).sum::<usize>(),
            next = exchanged.iter().map(|w| w.next).sum::<usize>(),
            "iteration complete"
        );
        Ok(())
    }

    fn check_cancel(&self, phase: Phase, iteration: u32) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(FrontierError::Cancelled { phase, iteration });
        }
        Ok(())
    }

    /// Counters of the last run, `None` before its first completed iteration
    #[must_use]
    pub fn statistics(&self) -> Option<Statistics> {
        self.stats.as_ref().and_then(StatsCollector::statistics)
    }

    /// Collector of the last run
    #[must_use]
    pub const fn collector(&self) -> Option<&StatsCollector> {
        self.stats.as_ref()
    }

    /// Report of the last run of `problem`
    ///
    /// # Errors
    ///
    /// `NotReady` unless `problem` completed a run with this enactor
    pub fn report<A: Algorithm>(&self, problem: &Problem<A>) -> Result<RunReport> {
        problem.ensure_completed("report")?;
        let stats = self.stats.as_ref().ok_or(FrontierError::NotReady {
            operation: "report",
            required: "a completed enact",
        })?;
        Ok(stats.report(problem.finalized()))
    }
}
