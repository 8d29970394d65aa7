use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::{Result, TimelineError};

/// Source of wall-clock time in whole Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Reads the system clock through chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whether `timestamp` (Unix seconds) names a date chrono can represent.
/// Interval arithmetic only ever sees timestamps inside this range.
pub fn is_representable(timestamp: i64) -> bool {
    chrono::DateTime::from_timestamp(timestamp, 0).is_some()
}

/// Maps timestamps onto fixed-width, floor-aligned intervals.
#[derive(Clone)]
pub struct IntervalClock {
    width: u64,
    clock: Arc<dyn Clock>,
}

impl IntervalClock {
    pub fn new(width: u64, clock: Arc<dyn Clock>) -> Result<Self> {
        if width == 0 {
            return Err(TimelineError::Config(
                "interval width must be a positive number of seconds".into(),
            ));
        }
        Ok(Self { width, clock })
    }

    /// Same width, different time source.
    pub fn with_clock(&self, clock: Arc<dyn Clock>) -> Self {
        Self {
            width: self.width,
            clock,
        }
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Start of the interval containing `timestamp`. Saturates at
    /// `i64::MIN` for timestamps outside the representable range.
    pub fn interval_id(&self, timestamp: i64) -> i64 {
        let width = self.width as i64;
        timestamp
            .div_euclid(width)
            .checked_mul(width)
            .unwrap_or(i64::MIN)
    }

    pub fn current_interval_id(&self) -> i64 {
        self.interval_id(self.now())
    }
}

impl std::fmt::Debug for IntervalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalClock")
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clock(width: u64, now: i64) -> IntervalClock {
        IntervalClock::new(width, Arc::new(ManualClock::new(now))).unwrap()
    }

    #[test]
    fn zero_width_is_rejected() {
        let err = IntervalClock::new(0, Arc::new(SystemClock)).unwrap_err();
        assert!(matches!(err, TimelineError::Config(_)));
    }

    #[test]
    fn current_interval_follows_manual_clock() {
        let manual = Arc::new(ManualClock::new(1_000_059));
        let ic = IntervalClock::new(60, manual.clone()).unwrap();
        assert_eq!(ic.current_interval_id(), 1_000_020);

        manual.advance(1);
        assert_eq!(ic.current_interval_id(), 1_000_060);
    }

    #[test]
    fn negative_timestamps_floor_downwards() {
        let ic = clock(10, 0);
        assert_eq!(ic.interval_id(-1), -10);
        assert_eq!(ic.interval_id(-10), -10);
        assert_eq!(ic.interval_id(9), 0);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let ic = clock(60, 0);
        assert_eq!(ic.interval_id(i64::MIN), i64::MIN);
        assert_eq!(ic.interval_id(i64::MAX), i64::MAX.div_euclid(60) * 60);
    }

    #[test]
    fn representable_range_follows_chrono() {
        assert!(is_representable(0));
        assert!(is_representable(1_700_000_040));
        assert!(is_representable(-1_700_000_040));
        assert!(!is_representable(i64::MIN));
        assert!(!is_representable(i64::MAX));
    }

    proptest! {
        #[test]
        fn interval_id_contains_timestamp(
            width in 1u64..100_000,
            t in -10_000_000_000i64..10_000_000_000i64,
        ) {
            let ic = clock(width, 0);
            let id = ic.interval_id(t);
            prop_assert!(id <= t);
            prop_assert!(t < id + width as i64);
            prop_assert_eq!(id.rem_euclid(width as i64), 0);
        }
    }
}
