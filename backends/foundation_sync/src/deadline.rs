//! Conversion of a relative timeout into what the native timed waits expect.
//!
//! POSIX timed calls take an absolute `timespec` deadline on a given clock,
//! Win32 waits take a relative millisecond count. Both conversions live here
//! as pure functions so every timed operation shares them.

use core::time::Duration;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

const NANOS_PER_MILLI: u128 = 1_000_000;

/// Largest finite Win32 wait; `u32::MAX` is `INFINITE`.
pub const MAX_FINITE_MILLIS: u32 = u32::MAX - 1;

/// An absolute point in time split the way `timespec` stores it.
///
/// `nanos` is always within `0..NANOS_PER_SEC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    secs: i64,
    nanos: i64,
}

impl Deadline {
    /// Adds `timeout` to the clock reading `now_secs` + `now_nanos`.
    ///
    /// The clock reading may carry a nanosecond part outside `0..1s`; it is
    /// normalized first. Seconds saturate at `i64::MAX`, so an enormous
    /// timeout becomes "effectively never" rather than wrapping into the past.
    #[must_use]
    pub fn after(now_secs: i64, now_nanos: i64, timeout: Duration) -> Self {
        let mut secs = now_secs.saturating_add(now_nanos.div_euclid(NANOS_PER_SEC));
        let mut nanos = now_nanos.rem_euclid(NANOS_PER_SEC);

        let timeout_secs = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
        secs = secs.saturating_add(timeout_secs);
        nanos += i64::from(timeout.subsec_nanos());

        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = secs.saturating_add(1);
        }

        Self { secs, nanos }
    }

    #[must_use]
    pub const fn secs(&self) -> i64 {
        self.secs
    }

    #[must_use]
    pub const fn nanos(&self) -> i64 {
        self.nanos
    }
}

/// Converts a timeout into a Win32 millisecond wait.
///
/// Rounds up so the wait never ends before `timeout` has elapsed, and stays
/// below `INFINITE` so a finite timeout never turns into an unbounded wait.
#[must_use]
pub fn relative_millis(timeout: Duration) -> u32 {
    let millis = timeout.as_nanos().div_ceil(NANOS_PER_MILLI);
    u32::try_from(millis).map_or(MAX_FINITE_MILLIS, |m| m.min(MAX_FINITE_MILLIS))
}
