//! Reader-writer lock: many readers or one writer.
//!
//! Timed acquisition returns `Ok(None)` when the timeout elapses, which is
//! distinct from both success and a native failure.

use core::fmt;
use core::marker::PhantomData;
use core::time::Duration;

use crate::errors::SyncResult;
use crate::sys;

pub struct RwLock {
    inner: sys::RwLock,
}

impl RwLock {
    /// # Errors
    ///
    /// Returns the native failure when the OS cannot create the lock.
    pub fn new() -> SyncResult<Self> {
        let inner = sys::RwLock::new()?;
        ewe_logs::debug!("[sync] rwlock created");
        Ok(Self { inner })
    }

    /// Acquires shared access, blocking while a writer holds the lock.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn read(&self) -> SyncResult<ReadGuard<'_>> {
        self.inner.read()?;
        Ok(ReadGuard::new(self))
    }

    /// Acquires exclusive access, blocking while anyone holds the lock.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn write(&self) -> SyncResult<WriteGuard<'_>> {
        self.inner.write()?;
        Ok(WriteGuard::new(self))
    }

    /// Like [`RwLock::read`] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the native failure; running out of time is `Ok(None)`.
    pub fn read_timeout(&self, timeout: Duration) -> SyncResult<Option<ReadGuard<'_>>> {
        if self.inner.read_timeout(timeout)? {
            Ok(Some(ReadGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// Like [`RwLock::write`] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the native failure; running out of time is `Ok(None)`.
    pub fn write_timeout(&self, timeout: Duration) -> SyncResult<Option<WriteGuard<'_>>> {
        if self.inner.write_timeout(timeout)? {
            Ok(Some(WriteGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] rwlock destroyed");
        Ok(())
    }
}

impl fmt::Debug for RwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock").finish_non_exhaustive()
    }
}

#[must_use = "shared access ends as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    lock: &'a RwLock,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ReadGuard<'a> {
    fn new(lock: &'a RwLock) -> Self {
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
        self.lock.inner.unlock_read()
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if self.locked {
            let _ = self.lock.inner.unlock_read();
        }
    }
}

impl fmt::Debug for ReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGuard").finish_non_exhaustive()
    }
}

#[must_use = "exclusive access ends as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    lock: &'a RwLock,
    locked: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> WriteGuard<'a> {
    fn new(lock: &'a RwLock) -> Self {
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
        self.lock.inner.unlock_write()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.locked {
            let _ = self.lock.inner.unlock_write();
        }
    }
}

impl fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_read_write_destroy() {
        let lock = RwLock::new().expect("create");
        lock.read().expect("read").unlock().expect("unlock");
        lock.write().expect("write").unlock().expect("unlock");
        lock.destroy().expect("destroy");
    }

    /// WHY: Readers share the lock
    /// WHAT: Two read guards held at once by different threads
    #[test]
    fn test_readers_share() {
        let lock = Arc::new(RwLock::new().expect("create"));
        let _held = lock.read().expect("read");

        let other = Arc::clone(&lock);
        let shared = thread::spawn(move || {
            other
                .read_timeout(Duration::from_millis(200))
                .expect("read_timeout")
                .is_some()
        })
        .join()
        .expect("thread");
        assert!(shared);
    }

    /// WHY: A timeout is a third outcome, not an error
    /// WHAT: write_timeout against a held reader yields Ok(None) after
    /// roughly the timeout
    #[test]
    fn test_write_timeout_elapses() {
        let lock = Arc::new(RwLock::new().expect("create"));
        let _held = lock.read().expect("read");

        let other = Arc::clone(&lock);
        let (timed_out, waited) = thread::spawn(move || {
            let start = std::time::Instant::now();
            let result = other
                .write_timeout(Duration::from_millis(50))
                .expect("write_timeout");
            (result.is_none(), start.elapsed())
        })
        .join()
        .expect("thread");

        assert!(timed_out);
        assert!(waited >= Duration::from_millis(40));
    }
}
