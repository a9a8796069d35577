//! Run statistics
//!
//! The enactor feeds a [`StatsCollector`] with per-iteration work counts and
//! per-device phase busy times. After a run it yields the compact
//! [`Statistics`] triple and a human-readable [`RunReport`].

use std::fmt;
use std::time::{Duration, Instant};

/// Busy time of one device, split by phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseBusy {
    /// Edge expansion
    pub advance: Duration,
    /// Compaction
    pub filter: Duration,
    /// Merge, refresh and swap
    pub exchange: Duration,
}

impl PhaseBusy {
    /// Sum over all phases
    #[must_use]
    pub fn total(&self) -> Duration {
        self.advance + self.filter + self.exchange
    }
}

/// Summary counters of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    /// Advance work items summed over all iterations and devices
    pub total_elements_queued: u64,
    /// Completed iterations (search depth for traversals)
    pub iteration_count: u32,
    /// Device busy time over wall time, averaged across devices
    pub average_duty_cycle: f64,
}

/// Report of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Wall time of the iteration loop
    pub elapsed: Duration,
    /// Frontier out-edges expanded by Advance
    pub edges_processed: u64,
    /// Millions of edges processed per second
    pub throughput_mteps: f64,
    /// Completed iterations
    pub search_depth: u32,
    /// Vertices with a final value
    pub vertices_finalized: usize,
    /// Work items queued beyond one per finalized vertex, in percent
    pub redundant_work_percent: f64,
    /// Device busy time over wall time
    pub duty_cycle: f64,
    /// Messages routed between devices
    pub remote_messages: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "elapsed:            {:.3} ms", self.elapsed.as_secs_f64() * 1e3)?;
        writeln!(f, "edges processed:    {}", self.edges_processed)?;
        writeln!(f, "throughput:         {:.2} MTEPS", self.throughput_mteps)?;
        writeln!(f, "search depth:       {}", self.search_depth)?;
        writeln!(f, "vertices finalized: {}", self.vertices_finalized)?;
        writeln!(f, "redundant work:     {:.2}%", self.redundant_work_percent)?;
        writeln!(f, "duty cycle:         {:.1}%", self.duty_cycle * 100.0)?;
        write!(f, "remote messages:    {}", self.remote_messages)
    }
}

/// Accumulates counters and timings while the enactor runs
#[derive(Debug, Clone)]
pub struct StatsCollector {
    started: Instant,
    elapsed: Option<Duration>,
    iterations: u32,
    elements_queued: u64,
    edges: u64,
    remote_messages: u64,
    frontier_sizes: Vec<usize>,
    busy: Vec<PhaseBusy>,
}

impl StatsCollector {
    /// Start collecting for `devices` devices
    #[must_use]
    pub fn new(devices: usize) -> Self {
        Self {
            started: Instant::now(),
            elapsed: None,
            iterations: 0,
            elements_queued: 0,
            edges: 0,
            remote_messages: 0,
            frontier_sizes: Vec::new(),
            busy: vec![PhaseBusy::default(); devices],
        }
    }

    /// An iteration starts with `frontier` vertices across all devices
    pub fn begin_iteration(&mut self, frontier: usize) {
        self.frontier_sizes.push(frontier);
    }

    /// Advance on `device` expanded `edges` edges into `queued` work items
    pub fn record_advance(&mut self, device: usize, edges: usize, queued: usize, busy: Duration) {
        self.edges += edges as u64;
        self.elements_queued += queued as u64;
        if let Some(slot) = self.busy.get_mut(device) {
            slot.advance += busy;
        }
    }

    /// Filter busy time on `device`
    pub fn record_filter(&mut self, device: usize, busy: Duration) {
        if let Some(slot) = self.busy.get_mut(device) {
            slot.filter += busy;
        }
    }

    /// Exchange busy time on `device`
    pub fn record_exchange(&mut self, device: usize, busy: Duration) {
        if let Some(slot) = self.busy.get_mut(device) {
            slot.exchange += busy;
        }
    }

    /// An iteration finished after routing `messages` remote messages
    pub fn end_iteration(&mut self, messages: usize) {
        self.remote_messages += messages as u64;
        self.iterations += 1;
    }

    /// Stop the wall clock
    pub fn finish(&mut self) {
        self.elapsed.get_or_insert_with(|| self.started.elapsed());
    }

    /// Wall time so far (or of the finished run)
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    /// Completed iterations
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Frontier size at the start of every iteration
    #[must_use]
    pub fn frontier_sizes(&self) -> &[usize] {
        &self.frontier_sizes
    }

    /// Per-device busy time
    #[must_use]
    pub fn busy(&self) -> &[PhaseBusy] {
        &self.busy
    }

    /// Busy time over wall time, averaged across devices, in `[0, 1]`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duty_cycle(&self) -> f64 {
        let wall = self.elapsed().as_secs_f64();
        if wall <= 0.0 || self.busy.is_empty() {
            return 0.0;
        }
        let busy: f64 = self.busy.iter().map(|b| b.total().as_secs_f64()).sum();
        (busy / (wall * self.busy.len() as f64)).clamp(0.0, 1.0)
    }

    /// Summary counters, `None` before the first completed iteration
    #[must_use]
    pub fn statistics(&self) -> Option<Statistics> {
        (self.iterations > 0).then(|| Statistics {
            total_elements_queued: self.elements_queued,
            iteration_count: self.iterations,
            average_duty_cycle: self.duty_cycle(),
        })
    }

    /// Report for a run that finalized `vertices_finalized` vertices
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self, vertices_finalized: usize) -> RunReport {
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();
        let throughput_mteps = if secs > 0.0 {
            self.edges as f64 / secs / 1e6
        } else {
            0.0
        };
        let redundant_work_percent = if vertices_finalized == 0 {
            0.0
        } else {
            let finalized = vertices_finalized as f64;
            ((self.elements_queued as f64 - finalized) / finalized * 100.0).max(0.0)
        };

        RunReport {
            elapsed,
            edges_processed: self.edges,
            throughput_mteps,
            search_depth: self.iterations,
            vertices_finalized,
            redundant_work_percent,
            duty_cycle: self.duty_cycle(),
            remote_messages: self.remote_messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_statistics_before_first_iteration() {
        let stats = StatsCollector::new(1);
        assert!(stats.statistics().is_none());
    }

    #[test]
    fn test_counters_accumulate() {
        let mut stats = StatsCollector::new(2);
        stats.begin_iteration(1);
        stats.record_advance(0, 3, 3, Duration::from_micros(5));
        stats.record_advance(1, 2, 1, Duration::from_micros(5));
        stats.record_filter(0, Duration::from_micros(1));
        stats.record_exchange(1, Duration::from_micros(1));
        stats.end_iteration(2);
        stats.begin_iteration(4);
        stats.record_advance(0, 4, 2, Duration::ZERO);
        stats.end_iteration(0);
        stats.finish();

        let summary = stats.statistics().unwrap();
        assert_eq!(summary.total_elements_queued, 6);
        assert_eq!(summary.iteration_count, 2);
        assert!((0.0..=1.0).contains(&summary.average_duty_cycle));
        assert_eq!(stats.frontier_sizes(), &[1, 4]);
        assert_eq!(stats.busy()[0].total(), Duration::from_micros(6));

        let report = stats.report(4);
        assert_eq!(report.edges_processed, 9);
        assert_eq!(report.search_depth, 2);
        assert_eq!(report.remote_messages, 2);
        assert!((report.redundant_work_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_display() {
        let mut stats = StatsCollector::new(1);
        stats.begin_iteration(1);
        stats.end_iteration(0);
        stats.finish();
        let text = stats.report(0).to_string();
        assert!(text.contains("search depth:       1"));
        assert!(text.contains("MTEPS"));
    }
}
