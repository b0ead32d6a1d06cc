use std::time::{Duration, Instant};

use tracing::info;

/// Milliseconds for log fields, saturating instead of truncating.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Counters for a single polling cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub conversations: usize,
    pub emitted: usize,
    pub skipped_self: usize,
    pub skipped_duplicate: usize,
    pub failed_fetches: usize,
    pub directory_failed: bool,
    pub time_taken: Duration,
}

impl CycleReport {
    pub fn is_degraded(&self) -> bool {
        self.directory_failed || self.failed_fetches > 0
    }
}

/// Lifetime totals of one incoming stream.
#[derive(Debug, Clone)]
pub struct PollStats {
    pub cycles: usize,
    pub degraded_cycles: usize,
    pub total_emitted: usize,
    pub total_skipped_self: usize,
    pub total_skipped_duplicate: usize,
    pub total_failed_fetches: usize,
    pub last_cycle: Option<CycleReport>,
    pub start_time: Instant,
}

impl Default for PollStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PollStats {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            degraded_cycles: 0,
            total_emitted: 0,
            total_skipped_self: 0,
            total_skipped_duplicate: 0,
            total_failed_fetches: 0,
            last_cycle: None,
            start_time: Instant::now(),
        }
    }

    pub fn add_cycle(&mut self, report: CycleReport) {
        self.cycles += 1;
        if report.is_degraded() {
            self.degraded_cycles += 1;
        }
        self.total_emitted += report.emitted;
        self.total_skipped_self += report.skipped_self;
        self.total_skipped_duplicate += report.skipped_duplicate;
        self.total_failed_fetches += report.failed_fetches;
        self.last_cycle = Some(report);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self) {
        info!(
            cycles = self.cycles,
            degraded_cycles = self.degraded_cycles,
            emitted = self.total_emitted,
            skipped_self = self.total_skipped_self,
            skipped_duplicate = self.total_skipped_duplicate,
            failed_fetches = self.total_failed_fetches,
            elapsed_ms = millis(self.elapsed()),
            "incoming stream summary"
        );
    }
}
