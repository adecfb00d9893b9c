//! High-precision monotonic timer.

use core::ops::Sub;
use core::time::Duration;

use crate::errors::SyncResult;
use crate::sys;

const NANOS_PER_SEC_U128: u128 = 1_000_000_000;

/// Raw reading of the monotonic counter, in backend ticks.
///
/// Only differences between two timestamps taken from the same process are
/// meaningful; convert them with [`Timer::elapsed_seconds`] or
/// [`Timer::elapsed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }
}

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Monotonic clock with a cached ticks-per-second divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    divisor: i64,
}

impl Timer {
    /// Queries the counter frequency once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Native`](crate::SyncError::Native) if the
    /// platform refuses to report it.
    pub fn new() -> SyncResult<Self> {
        let divisor = sys::clock_frequency()?;
        ewe_logs::debug!("[sync] timer divisor {} ticks/s", divisor);
        Ok(Self { divisor })
    }

    /// Reads the counter. Later readings never compare less than earlier ones.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        Timestamp(sys::clock_ticks())
    }

    /// Ticks per second.
    #[must_use]
    pub const fn divisor(&self) -> i64 {
        self.divisor
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_seconds(&self, start: Timestamp, end: Timestamp) -> f64 {
        (end - start) as f64 / self.divisor as f64
    }

    /// Elapsed time between two readings; zero if `end` precedes `start`.
    #[must_use]
    pub fn elapsed(&self, start: Timestamp, end: Timestamp) -> Duration {
        let ticks = u128::try_from(end - start).unwrap_or(0);
        let divisor = u128::try_from(self.divisor).unwrap_or(1).max(1);
        let nanos = ticks * NANOS_PER_SEC_U128 / divisor;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Elapsed-time measurement depends on readings never going back
    /// WHAT: 10,000 consecutive reads are non-decreasing
    #[test]
    fn test_now_never_regresses() {
        let timer = Timer::new().expect("timer");
        let mut previous = timer.now();
        for _ in 0..10_000 {
            let current = timer.now();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_divisor_is_positive() {
        let timer = Timer::new().expect("timer");
        assert!(timer.divisor() > 0);
    }

    /// WHY: Conversions must scale by the divisor, not assume nanoseconds
    /// WHAT: One divisor worth of ticks is one second
    #[test]
    fn test_elapsed_scales_by_divisor() {
        let timer = Timer { divisor: 10_000_000 };
        let start = Timestamp(5);
        let end = Timestamp(5 + 15_000_000);
        assert!((timer.elapsed_seconds(start, end) - 1.5).abs() < f64::EPSILON);
        assert_eq!(timer.elapsed(start, end), Duration::from_millis(1500));
        assert_eq!(timer.elapsed(end, start), Duration::ZERO);
        assert_eq!(end - start, 15_000_000);
    }

    #[test]
    fn test_elapsed_tracks_sleep() {
        let timer = Timer::new().expect("timer");
        let start = timer.now();
        std::thread::sleep(Duration::from_millis(20));
        let end = timer.now();
        assert!(timer.elapsed(start, end) >= Duration::from_millis(20));
        assert!(timer.elapsed_seconds(start, end) >= 0.02);
    }
}
