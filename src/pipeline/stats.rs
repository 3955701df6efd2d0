//! Run statistics: the shared success counter and per-worker tallies.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Process-wide count of users created. The only state workers mutate jointly.
#[derive(Debug, Default)]
pub struct SuccessCounter(AtomicUsize);

impl SuccessCounter {
    /// Increment and return the new total in one atomic step.
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether reaching `total` successes warrants a progress notice. `every == 0` disables notices.
pub fn progress_due(total: usize, every: usize) -> bool {
    every > 0 && total % every == 0
}

/// Outcomes observed by a single worker. Merged by the coordinator at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Records that hit a 429 and were resubmitted.
    pub rate_limited: usize,
    /// Records abandoned after the outer retry ran out of attempts.
    pub exhausted: usize,
}

impl WorkerReport {
    pub fn merge(&mut self, other: WorkerReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
        self.rate_limited += other.rate_limited;
        self.exhausted += other.exhausted;
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.timed_out + self.exhausted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the input.
    pub streamed: u64,
    /// Final value of the shared success counter.
    pub imported: usize,
    pub report: WorkerReport,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "import complete: {} of {} users imported, {} failed, {} timed out, {} abandoned, {} rate limited ({}s)",
            self.imported,
            self.streamed,
            self.report.failed,
            self.report.timed_out,
            self.report.exhausted,
            self.report.rate_limited,
            self.elapsed.as_secs()
        )
    }
}
