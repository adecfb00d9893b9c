//! Condition variable paired with [`Mutex`](crate::Mutex).
//!
//! Waiting takes `&mut MutexGuard`, so only a thread that holds the mutex can
//! wait, and it holds it again when the call returns. Wakeups may be
//! spurious; callers re-check their predicate in a loop.

use core::fmt;
use core::time::Duration;

use crate::errors::SyncResult;
use crate::mutex::MutexGuard;
use crate::sys;

/// Result of a timed wait that did not fail.
///
/// Returned by [`CondVar::wait_timeout`] and the other timed waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken before the timeout (possibly spuriously, for condvars).
    Notified,
    TimedOut,
}

impl WaitOutcome {
    #[inline]
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

pub struct CondVar {
    inner: sys::CondVar,
}

impl CondVar {
    /// # Errors
    ///
    /// Returns the native failure when the OS cannot create the condvar.
    pub fn new() -> SyncResult<Self> {
        let inner = sys::CondVar::new()?;
        ewe_logs::debug!("[sync] condvar created");
        Ok(Self { inner })
    }

    /// Atomically releases the guarded mutex and sleeps until notified, then
    /// reacquires the mutex.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn wait(&self, guard: &mut MutexGuard<'_>) -> SyncResult<()> {
        self.inner.wait(guard.mutex().native())
    }

    /// Like [`CondVar::wait`] but gives up after `timeout`. The mutex is held
    /// again in every outcome.
    ///
    /// # Errors
    ///
    /// Returns the native failure; running out of time is
    /// [`WaitOutcome::TimedOut`].
    pub fn wait_timeout(
        &self,
        guard: &mut MutexGuard<'_>,
        timeout: Duration,
    ) -> SyncResult<WaitOutcome> {
        if self.inner.wait_timeout(guard.mutex().native(), timeout)? {
            Ok(WaitOutcome::Notified)
        } else {
            Ok(WaitOutcome::TimedOut)
        }
    }

    /// Wakes at most one waiter. Has no effect without waiters.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn notify_one(&self) -> SyncResult<()> {
        self.inner.notify_one()
    }

    /// Wakes every current waiter.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn notify_all(&self) -> SyncResult<()> {
        self.inner.notify_all()
    }

    /// # Errors
    ///
    /// Returns the native failure, e.g. `EBUSY` while threads still wait.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] condvar destroyed");
        Ok(())
    }
}

impl fmt::Debug for CondVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CondVar").finish_non_exhaustive()
    }
}
