//! Busy-waiting exclusive lock.
//!
//! Same surface as [`Mutex`](crate::Mutex). Waiters burn CPU instead of
//! sleeping, so critical sections must stay short and must never block.

use core::fmt;
use core::marker::PhantomData;

use crate::errors::SyncResult;
use crate::mutex::Lock;
use crate::sys;

pub struct Spinlock {
    inner: sys::Spinlock,
}

impl Spinlock {
    /// # Errors
    ///
    /// Returns the native failure when the OS cannot create the spinlock.
    pub fn new() -> SyncResult<Self> {
        let inner = sys::Spinlock::new()?;
        ewe_logs::debug!("[sync] spinlock created");
        Ok(Self { inner })
    }

    /// Spins until the lock is held.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn lock(&self) -> SyncResult<SpinlockGuard<'_>> {
        self.inner.lock()?;
        Ok(SpinlockGuard::new(self))
    }

    /// # Errors
    ///
    /// Returns the native failure; a held spinlock is `Ok(None)`.
    pub fn try_lock(&self) -> SyncResult<Option<SpinlockGuard<'_>>> {
        if self.inner.try_lock()? {
            Ok(Some(SpinlockGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] spinlock destroyed");
        Ok(())
    }
}

impl fmt::Debug for Spinlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinlock").finish_non_exhaustive()
    }
}

impl Lock for Spinlock {
    type Guard<'a> = SpinlockGuard<'a>;

    fn acquire(&self) -> SyncResult<SpinlockGuard<'_>> {
        self.lock()
    }

    fn try_acquire(&self) -> SyncResult<Option<SpinlockGuard<'_>>> {
        self.try_lock()
    }

    fn release(guard: SpinlockGuard<'_>) -> SyncResult<()> {
        guard.unlock()
    }
}

#[must_use = "the spinlock is released as soon as the guard is dropped"]
pub struct SpinlockGuard<'a> {
    lock: &'a Spinlock,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> SpinlockGuard<'a> {
    fn new(lock: &'a Spinlock) -> Self {
        Self {
            lock,
            locked: true,
            _not_send: PhantomData,
        }
    }

    /// # Errors
    ///
    /// Returns the native failure.
    pub fn unlock(mut self) -> SyncResult<()> {
        self.locked = false;
        self.lock.inner.unlock()
    }
}

impl fmt::Debug for SpinlockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinlockGuard").finish_non_exhaustive()
    }
}

impl Drop for SpinlockGuard<'_> {
    fn drop(&mut self) {
        if self.locked {
            let _ = self.lock.inner.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_lock_unlock_destroy() {
        let lock = Spinlock::new().expect("create");
        lock.lock().expect("lock").unlock().expect("unlock");
        lock.destroy().expect("destroy");
    }

    /// WHY: A waiter must spin until the holder releases
    /// WHAT: The second thread only enters after the flag is set and the
    /// guard released
    #[test]
    fn test_waiter_enters_after_release() {
        let lock = Arc::new(Spinlock::new().expect("create"));
        let released = Arc::new(AtomicBool::new(false));
        let guard = lock.lock().expect("lock");

        let waiter = {
            let lock = Arc::clone(&lock);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let guard = lock.lock().expect("lock");
                let saw_release = released.load(Ordering::SeqCst);
                guard.unlock().expect("unlock");
                saw_release
            })
        };

        thread::sleep(Duration::from_millis(20));
        released.store(true, Ordering::SeqCst);
        guard.unlock().expect("unlock");

        assert!(waiter.join().expect("thread"));
    }

    #[test]
    fn test_try_lock_when_held() {
        let lock = Arc::new(Spinlock::new().expect("create"));
        let _guard = lock.lock().expect("lock");
        let other = Arc::clone(&lock);
        let busy = thread::spawn(move || other.try_lock().expect("try_lock").is_none())
            .join()
            .expect("thread");
        assert!(busy);
    }
}
