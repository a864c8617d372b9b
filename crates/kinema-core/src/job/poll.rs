//! Polling cadence and classification of failed status reads.

use std::time::Duration;

/// Shortest interval a policy will sleep; a zero interval would never spend
/// the budget.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-interval polling with a total wait budget.
///
/// The budget is counted in slept intervals, not wall-clock time, so the
/// maximum poll count is exact. Each status read is cut off after
/// `read_timeout` (the interval unless overridden), so a stalled vendor can
/// stretch a wait to at most twice its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between successive status checks
    pub interval: Duration,
    /// Maximum total wait before giving up
    pub timeout: Duration,
    /// Longest a single status read may take
    pub read_timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        Self {
            interval,
            timeout,
            read_timeout: interval,
        }
    }

    /// Override the per-read cutoff.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }

    /// Upper bound on status checks: `ceil(timeout / interval)`.
    pub fn max_polls(&self) -> u32 {
        let interval = self.interval.as_nanos().max(1);
        self.timeout.as_nanos().div_ceil(interval) as u32
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_secs(15, 600)
    }
}

/// Whether an HTTP status on a status read means "try again later" rather
/// than "the job is gone".
///
/// Rate limits (429) and server errors (5xx) are transient; other 4xx
/// responses are final.
pub fn is_transient_status(code: u16) -> bool {
    code == 429 || (500..=599).contains(&code)
}
