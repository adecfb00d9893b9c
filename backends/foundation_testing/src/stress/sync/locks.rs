//! Mutual exclusion stress for [`Lock`] implementations.

use core::cell::UnsafeCell;
use std::sync::Arc;

use foundation_sync::Lock;

use crate::stress::{StressConfig, StressHarness, StressResult};

/// A counter with no synchronization of its own.
///
/// Increments are a plain read followed by a plain write, so two threads
/// incrementing without a shared lock lose updates. That makes the final
/// value a direct measure of whether a lock really excluded.
pub struct UnguardedCounter {
    value: UnsafeCell<u64>,
}

// SAFETY: every access goes through the unsafe methods below, whose callers
// promise external exclusion.
unsafe impl Sync for UnguardedCounter {}

impl UnguardedCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: UnsafeCell::new(0),
        }
    }

    /// Adds one.
    ///
    /// # Safety
    ///
    /// The caller must hold a lock that every other caller of `increment`
    /// and `load` on this counter also holds.
    pub unsafe fn increment(&self) {
        let slot = self.value.get();
        // Volatile so the compiler keeps the separate read and write.
        let current = slot.read_volatile();
        slot.write_volatile(current + 1);
    }

    /// Reads the current value.
    ///
    /// # Safety
    ///
    /// Same as [`UnguardedCounter::increment`], or no other thread may be
    /// touching the counter anymore.
    #[must_use]
    pub unsafe fn load(&self) -> u64 {
        self.value.get().read_volatile()
    }
}

impl Default for UnguardedCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`run_lock_exclusion`].
#[derive(Debug, Clone)]
pub struct ExclusionReport {
    /// `threads * iterations`
    pub expected: u64,
    /// Final value of the shared counter
    pub observed: u64,
    pub stress: StressResult,
}

impl ExclusionReport {
    /// No update was lost and no lock operation failed.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.expected == self.observed && self.stress.is_clean()
    }
}

/// Each worker increments one [`UnguardedCounter`] once per iteration inside
/// `lock`.
///
/// # Examples
///
/// ```
/// use foundation_sync::Spinlock;
/// use foundation_testing::stress::{StressConfig, sync::run_lock_exclusion};
///
/// let config = StressConfig::new().threads(4).iterations(1_000);
/// let report = run_lock_exclusion(Spinlock::new().unwrap(), config);
///
/// assert!(report.is_exclusive());
/// assert_eq!(report.observed, 4_000);
/// ```
#[must_use]
pub fn run_lock_exclusion<L>(lock: L, config: StressConfig) -> ExclusionReport
where
    L: Lock + Send + 'static,
{
    let lock = Arc::new(lock);
    let counter = Arc::new(UnguardedCounter::new());

    let shared_lock = Arc::clone(&lock);
    let shared_counter = Arc::clone(&counter);
    let stress = StressHarness::new(config).run(move |_thread_id, _iteration| {
        let guard = shared_lock.acquire()?;
        // SAFETY: every increment runs while `guard` holds the shared lock.
        unsafe { shared_counter.increment() };
        L::release(guard)
    });

    // SAFETY: the harness joined every worker before returning.
    let observed = unsafe { counter.load() };
    let expected = config.planned_operations() as u64;

    ExclusionReport {
        expected,
        observed,
        stress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_sync::Mutex;

    #[test]
    fn test_mutex_excludes() {
        let config = StressConfig::new().threads(4).iterations(2_000);
        let report = run_lock_exclusion(Mutex::new().expect("mutex"), config);
        assert!(report.is_exclusive(), "{report:?}");
        assert_eq!(report.expected, 8_000);
    }

    #[test]
    fn test_counter_single_thread() {
        let counter = UnguardedCounter::new();
        for _ in 0..10 {
            // SAFETY: single thread.
            unsafe { counter.increment() };
        }
        // SAFETY: single thread.
        assert_eq!(unsafe { counter.load() }, 10);
    }
}
