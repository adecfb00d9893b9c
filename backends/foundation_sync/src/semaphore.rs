//! Counting semaphore.

use core::fmt;
use core::time::Duration;

use crate::condvar::WaitOutcome;
use crate::errors::{SyncError, SyncResult};
use crate::sys;

/// Largest count accepted by both backends (`SEM_VALUE_MAX` on glibc,
/// `LONG` on Win32).
pub const MAX_COUNT: u32 = i32::MAX.unsigned_abs();

pub struct Semaphore {
    inner: sys::Semaphore,
}

impl Semaphore {
    /// Creates a semaphore holding `initial` permits.
    ///
    /// # Errors
    ///
    /// `initial` above [`MAX_COUNT`] is an invalid argument; otherwise the
    /// native failure.
    pub fn new(initial: u32) -> SyncResult<Self> {
        if initial > MAX_COUNT {
            return Err(SyncError::invalid_argument(
                "Semaphore::new",
                "initial",
                "count exceeds the platform maximum",
            ));
        }
        let inner = sys::Semaphore::new(initial)?;
        ewe_logs::debug!("[sync] semaphore created with {} permits", initial);
        Ok(Self { inner })
    }

    /// Takes one permit, blocking while none is available.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn wait(&self) -> SyncResult<()> {
        self.inner.wait()
    }

    /// Takes one permit, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the native failure; running out of time is
    /// [`WaitOutcome::TimedOut`].
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<WaitOutcome> {
        if self.inner.wait_timeout(timeout)? {
            Ok(WaitOutcome::Notified)
        } else {
            Ok(WaitOutcome::TimedOut)
        }
    }

    /// Returns one permit, waking one waiter if any.
    ///
    /// # Errors
    ///
    /// Returns the native failure, e.g. when the count would exceed its
    /// maximum.
    pub fn signal(&self) -> SyncResult<()> {
        self.inner.signal()
    }

    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] semaphore destroyed");
        Ok(())
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").finish_non_exhaustive()
    }
}
