//! Rate limiting of outbound reports.
//!
//! Two independent mechanisms decide what reaches the notification sink:
//! - [`ProgressCounter`] counts every accepted sample and fires on each
//!   multiple of the progress interval.
//! - [`ReportThrottle`] forwards a diff only when more than the report
//!   interval of wall-clock time passed since the last forwarded one.
//!   Dropped diffs are not buffered.
//!
//! The throttle reads time through the [`Clock`] trait so hosts can supply
//! their own time base and tests can drive it by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of wall-clock milliseconds for the report throttle.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so one handle can be given to the engine
/// and another kept by the caller (a replay driver or a test).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Limits diff reports to one per interval.
#[derive(Debug, Clone)]
pub struct ReportThrottle {
    interval_ms: u64,
    last_emit_ms: Option<u64>,
}

impl ReportThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_emit_ms: None,
        }
    }

    /// Forgets the last emission so the next report always passes.
    pub fn reset(&mut self) {
        self.last_emit_ms = None;
    }

    /// Returns `true` and records `now_ms` when a report may be emitted.
    pub fn try_emit(&mut self, now_ms: u64) -> bool {
        let due = match self.last_emit_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.interval_ms,
        };
        if due {
            self.last_emit_ms = Some(now_ms);
        }
        due
    }

    pub fn last_emit_ms(&self) -> Option<u64> {
        self.last_emit_ms
    }
}

/// Counts samples and signals every Nth one.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    count: u64,
    interval: u64,
}

impl ProgressCounter {
    pub fn new(interval: u64) -> Self {
        Self { count: 0, interval }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Counts one sample. Returns the new count when it is a multiple of
    /// the interval.
    pub fn increment(&mut self) -> Option<u64> {
        self.count += 1;
        if self.interval > 0 && self.count % self.interval == 0 {
            Some(self.count)
        } else {
            None
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_report_passes() {
        let mut throttle = ReportThrottle::new(100);
        assert!(throttle.try_emit(0));
        assert_eq!(throttle.last_emit_ms(), Some(0));
    }

    #[test]
    fn test_throttle_drops_within_interval() {
        let mut throttle = ReportThrottle::new(100);
        assert!(throttle.try_emit(1_000));
        assert!(!throttle.try_emit(1_030));
        assert!(!throttle.try_emit(1_100));
        assert_eq!(throttle.last_emit_ms(), Some(1_000));
        assert!(throttle.try_emit(1_101));
    }

    #[test]
    fn test_throttle_passes_after_interval() {
        let mut throttle = ReportThrottle::new(100);
        assert!(throttle.try_emit(1_000));
        assert!(throttle.try_emit(1_150));
    }

    #[test]
    fn test_throttle_reset() {
        let mut throttle = ReportThrottle::new(100);
        assert!(throttle.try_emit(50));
        throttle.reset();
        assert!(throttle.try_emit(60));
    }

    #[test]
    fn test_progress_every_interval() {
        let mut counter = ProgressCounter::new(1000);
        let fired: Vec<u64> = (0..3500).filter_map(|_| counter.increment()).collect();
        assert_eq!(fired, vec![1000, 2000, 3000]);
        assert_eq!(counter.count(), 3500);
        counter.reset();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(10);
        let handle = clock.clone();
        handle.advance_ms(5);
        assert_eq!(clock.now_ms(), 15);
        handle.set_ms(100);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn test_monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
