//! Mutual exclusion lock over the native mutex.
//!
//! Holding a [`MutexGuard`] is the only way to be "inside" the lock, and the
//! guard cannot leave its thread, so the lock is always released by the
//! thread that acquired it.

use core::fmt;
use core::marker::PhantomData;

use crate::errors::SyncResult;
use crate::sys;

/// Shared shape of the exclusive locks ([`Mutex`] and
/// [`Spinlock`](crate::Spinlock)), so callers can be generic over them.
pub trait Lock: Sync {
    type Guard<'a>
    where
        Self: 'a;

    /// Blocks until the lock is held.
    ///
    /// # Errors
    ///
    /// Returns the native failure, the lock is not held then.
    fn acquire(&self) -> SyncResult<Self::Guard<'_>>;

    /// Takes the lock only if it is free right now.
    ///
    /// # Errors
    ///
    /// Returns the native failure; a busy lock is `Ok(None)`.
    fn try_acquire(&self) -> SyncResult<Option<Self::Guard<'_>>>;

    /// Releases a guard and reports the native result, where dropping it
    /// would discard that result.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    fn release(guard: Self::Guard<'_>) -> SyncResult<()>;
}

pub struct Mutex {
    inner: sys::Mutex,
}

impl Mutex {
    /// # Errors
    ///
    /// Returns the native failure when the OS cannot create the mutex.
    pub fn new() -> SyncResult<Self> {
        let inner = sys::Mutex::new()?;
        ewe_logs::debug!("[sync] mutex created");
        Ok(Self { inner })
    }

    /// # Errors
    ///
    /// Returns the native failure. On POSIX, locking a mutex the calling
    /// thread already holds fails with `EDEADLK`.
    pub fn lock(&self) -> SyncResult<MutexGuard<'_>> {
        self.inner.lock()?;
        Ok(MutexGuard::new(self))
    }

    /// # Errors
    ///
    /// Returns the native failure; a held mutex is `Ok(None)`.
    pub fn try_lock(&self) -> SyncResult<Option<MutexGuard<'_>>> {
        if self.inner.try_lock()? {
            Ok(Some(MutexGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// Releases the native mutex and reports the result. Dropping the mutex
    /// does the same but discards the result.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] mutex destroyed");
        Ok(())
    }

    pub(crate) fn native(&self) -> &sys::Mutex {
        &self.inner
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

impl Lock for Mutex {
    type Guard<'a> = MutexGuard<'a>;

    fn acquire(&self) -> SyncResult<MutexGuard<'_>> {
        self.lock()
    }

    fn try_acquire(&self) -> SyncResult<Option<MutexGuard<'_>>> {
        self.try_lock()
    }

    fn release(guard: MutexGuard<'_>) -> SyncResult<()> {
        guard.unlock()
    }
}

/// Proof that the current thread holds a [`Mutex`].
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> MutexGuard<'a> {
    fn new(mutex: &'a Mutex) -> Self {
        Self {
            mutex,
            locked: true,
            _not_send: PhantomData,
        }
    }

    /// Releases the mutex and reports the native result.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn unlock(mut self) -> SyncResult<()> {
        self.locked = false;
        self.mutex.inner.unlock()
    }

    pub(crate) fn mutex(&self) -> &'a Mutex {
        self.mutex
    }
}

impl fmt::Debug for MutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if self.locked {
            let _ = self.mutex.inner.unlock();
        }
    }
}
