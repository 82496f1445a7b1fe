//! Wall-clock accumulators for queries and systems.

use std::time::Duration;

/// Accumulated elapsed time for one named caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    /// Number of recorded runs.
    pub calls: u64,
    /// Sum of all recorded runs.
    pub total: Duration,
    /// The most recent run.
    pub last: Duration,
}

impl Timing {
    /// Add one run.
    pub fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.last = elapsed;
    }

    /// Mean time per run, zero if nothing was recorded.
    #[must_use]
    pub fn average(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.calls as f64),
        }
    }
}
