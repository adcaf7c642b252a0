//! Fixed-period tick scheduling.
//!
//! Ticks are never queued: if a tick's work overruns one or more periods,
//! the missed deadlines are skipped and the next tick lands on the period
//! grid after `now`.

use std::time::{Duration, Instant};

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct FixedTicker {
    period: Duration,
    next: Option<Instant>,
    skipped: u64,
}

impl FixedTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            next: None,
            skipped: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Total deadlines skipped because a tick overran
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Next deadline; the first deadline is "now".
    pub fn deadline(&mut self) -> Instant {
        *self.next.get_or_insert_with(Instant::now)
    }

    /// Record that the tick for the current deadline fired at `now`.
    ///
    /// Returns how many deadlines were skipped.
    pub fn fire(&mut self, now: Instant) -> u64 {
        let deadline = self.deadline();
        let behind = now.saturating_duration_since(deadline);
        let skipped = (behind.as_nanos() / self.period.as_nanos()) as u64;
        let steps = u32::try_from(skipped + 1).unwrap_or(u32::MAX);
        self.next = Some(deadline + self.period * steps);
        self.skipped += skipped;
        skipped
    }

    /// Sleep until the next deadline, then mark it fired.
    pub fn wait(&mut self) -> u64 {
        let deadline = self.deadline();
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.fire(Instant::now())
    }
}
