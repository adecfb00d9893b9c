//! POSIX backend: pthreads, unnamed semaphores and `clock_gettime`.
//!
//! Every native object lives in its own heap allocation because pthread
//! objects must not move once initialized. Each wrapper owns that
//! allocation and runs the matching `*_destroy` exactly once, either from
//! `destroy` or from `Drop`.

use core::cell::UnsafeCell;
use core::mem;
use core::time::Duration;

use libc::{c_int, c_uint};

use crate::deadline::{Deadline, NANOS_PER_SEC};
use crate::errors::{SyncError, SyncResult};

/// glibc value of `PTHREAD_BARRIER_SERIAL_THREAD`.
const BARRIER_SERIAL_THREAD: c_int = -1;

extern "C" {
    fn pthread_rwlock_timedrdlock(
        rwlock: *mut libc::pthread_rwlock_t,
        abstime: *const libc::timespec,
    ) -> c_int;

    fn pthread_rwlock_timedwrlock(
        rwlock: *mut libc::pthread_rwlock_t,
        abstime: *const libc::timespec,
    ) -> c_int;
}

/// Maps a pthread-style return code (0 or an errno value).
#[inline]
fn check(operation: &'static str, code: c_int) -> SyncResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(SyncError::native(operation, code))
    }
}

#[inline]
fn last_errno() -> c_int {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EINVAL)
}

/// Maps a `-1`-and-errno style return code (`sem_*`, `clock_gettime`).
#[inline]
fn check_errno(operation: &'static str, rc: c_int) -> SyncResult<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(SyncError::native(operation, last_errno()))
    }
}

struct Native<T> {
    cell: Box<UnsafeCell<T>>,
    live: bool,
}

impl<T> Native<T> {
    /// Zeroed storage, then `init` on its final address. The storage is
    /// freed without a destroy call when `init` fails.
    fn new(
        operation: &'static str,
        init: impl FnOnce(*mut T) -> c_int,
    ) -> SyncResult<Self> {
        // SAFETY: every pthread/sem type is plain old data, zero is a valid
        // bit pattern before the init call overwrites it.
        let cell: Box<UnsafeCell<T>> = Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        check(operation, init(cell.get()))?;
        Ok(Self { cell, live: true })
    }

    #[inline]
    fn get(&self) -> *mut T {
        self.cell.get()
    }

    /// Runs the native destroy once; later calls are no-ops.
    fn release(&mut self, destroy: impl FnOnce(*mut T) -> SyncResult<()>) -> SyncResult<()> {
        if !self.live {
            return Ok(());
        }
        self.live = false;
        destroy(self.cell.get())
    }
}

/// Reads `clock` into a [`Deadline`] `timeout` from now.
fn deadline_on(clock: libc::clockid_t, timeout: Duration) -> SyncResult<libc::timespec> {
    // SAFETY: timespec is plain old data.
    let mut now: libc::timespec = unsafe { mem::zeroed() };
    // SAFETY: `now` is a valid, writable timespec.
    check_errno("clock_gettime", unsafe { libc::clock_gettime(clock, &mut now) })?;

    #[allow(clippy::useless_conversion)]
    let deadline = Deadline::after(i64::from(now.tv_sec), i64::from(now.tv_nsec), timeout);

    // SAFETY: timespec is plain old data.
    let mut abstime: libc::timespec = unsafe { mem::zeroed() };
    abstime.tv_sec = libc::time_t::try_from(deadline.secs()).unwrap_or(libc::time_t::MAX);
    abstime.tv_nsec = deadline.nanos() as _;
    Ok(abstime)
}

// ============================================================================
// Clock
// ============================================================================

pub(crate) fn clock_frequency() -> SyncResult<i64> {
    Ok(NANOS_PER_SEC)
}

pub(crate) fn clock_ticks() -> i64 {
    // SAFETY: timespec is plain old data.
    let mut now: libc::timespec = unsafe { mem::zeroed() };
    // SAFETY: CLOCK_MONOTONIC always exists on Linux and `now` is writable,
    // so the call cannot fail.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut now) };
    debug_assert_eq!(rc, 0, "CLOCK_MONOTONIC must be readable");

    #[allow(clippy::useless_conversion)]
    i64::from(now.tv_sec)
        .saturating_mul(NANOS_PER_SEC)
        .saturating_add(i64::from(now.tv_nsec))
}

// ============================================================================
// Mutex
// ============================================================================

pub(crate) struct Mutex {
    native: Native<libc::pthread_mutex_t>,
}

// SAFETY: a pthread mutex is designed to be shared between threads and it
// never moves out of its box.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub(crate) fn new() -> SyncResult<Self> {
        let native = Native::new("pthread_mutex_init", |raw| unsafe {
            let mut attr: libc::pthread_mutexattr_t = mem::zeroed();
            let rc = libc::pthread_mutexattr_init(&mut attr);
            if rc != 0 {
                return rc;
            }
            // Relocking from the owning thread reports EDEADLK instead of hanging.
            let rc = libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_ERRORCHECK);
            let rc = if rc == 0 {
                libc::pthread_mutex_init(raw, &attr)
            } else {
                rc
            };
            libc::pthread_mutexattr_destroy(&mut attr);
            rc
        })?;
        Ok(Self { native })
    }

    #[inline]
    pub(crate) fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.native.get()
    }

    pub(crate) fn lock(&self) -> SyncResult<()> {
        check("pthread_mutex_lock", unsafe { libc::pthread_mutex_lock(self.raw()) })
    }

    pub(crate) fn try_lock(&self) -> SyncResult<bool> {
        match unsafe { libc::pthread_mutex_trylock(self.raw()) } {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            code => Err(SyncError::native("pthread_mutex_trylock", code)),
        }
    }

    pub(crate) fn unlock(&self) -> SyncResult<()> {
        check("pthread_mutex_unlock", unsafe { libc::pthread_mutex_unlock(self.raw()) })
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native.release(|raw| {
            check("pthread_mutex_destroy", unsafe { libc::pthread_mutex_destroy(raw) })
        })
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ============================================================================
// Spinlock
// ============================================================================

pub(crate) struct Spinlock {
    native: Native<libc::pthread_spinlock_t>,
}

// SAFETY: see `Mutex`.
unsafe impl Send for Spinlock {}
unsafe impl Sync for Spinlock {}

impl Spinlock {
    pub(crate) fn new() -> SyncResult<Self> {
        let native = Native::new("pthread_spin_init", |raw| unsafe {
            libc::pthread_spin_init(raw, libc::PTHREAD_PROCESS_PRIVATE)
        })?;
        Ok(Self { native })
    }

    pub(crate) fn lock(&self) -> SyncResult<()> {
        check("pthread_spin_lock", unsafe {
            libc::pthread_spin_lock(self.native.get())
        })
    }

    pub(crate) fn try_lock(&self) -> SyncResult<bool> {
        match unsafe { libc::pthread_spin_trylock(self.native.get()) } {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            code => Err(SyncError::native("pthread_spin_trylock", code)),
        }
    }

    pub(crate) fn unlock(&self) -> SyncResult<()> {
        check("pthread_spin_unlock", unsafe {
            libc::pthread_spin_unlock(self.native.get())
        })
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native.release(|raw| {
            check("pthread_spin_destroy", unsafe { libc::pthread_spin_destroy(raw) })
        })
    }
}

impl Drop for Spinlock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ============================================================================
// RwLock
// ============================================================================

pub(crate) struct RwLock {
    native: Native<libc::pthread_rwlock_t>,
}

// SAFETY: see `Mutex`.
unsafe impl Send for RwLock {}
unsafe impl Sync for RwLock {}

impl RwLock {
    pub(crate) fn new() -> SyncResult<Self> {
        let native = Native::new("pthread_rwlock_init", |raw| unsafe {
            libc::pthread_rwlock_init(raw, core::ptr::null())
        })?;
        Ok(Self { native })
    }

    pub(crate) fn read(&self) -> SyncResult<()> {
        check("pthread_rwlock_rdlock", unsafe {
            libc::pthread_rwlock_rdlock(self.native.get())
        })
    }

    pub(crate) fn write(&self) -> SyncResult<()> {
        check("pthread_rwlock_wrlock", unsafe {
            libc::pthread_rwlock_wrlock(self.native.get())
        })
    }

    /// `Ok(false)` when the deadline passed first.
    pub(crate) fn read_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        // The timed rwlock calls only measure CLOCK_REALTIME.
        let abstime = deadline_on(libc::CLOCK_REALTIME, timeout)?;
        match unsafe { pthread_rwlock_timedrdlock(self.native.get(), &abstime) } {
            0 => Ok(true),
            libc::ETIMEDOUT => Ok(false),
            code => Err(SyncError::native("pthread_rwlock_timedrdlock", code)),
        }
    }

    /// `Ok(false)` when the deadline passed first.
    pub(crate) fn write_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        let abstime = deadline_on(libc::CLOCK_REALTIME, timeout)?;
        match unsafe { pthread_rwlock_timedwrlock(self.native.get(), &abstime) } {
            0 => Ok(true),
            libc::ETIMEDOUT => Ok(false),
            code => Err(SyncError::native("pthread_rwlock_timedwrlock", code)),
        }
    }

    pub(crate) fn unlock_read(&self) -> SyncResult<()> {
        self.unlock()
    }

    pub(crate) fn unlock_write(&self) -> SyncResult<()> {
        self.unlock()
    }

    fn unlock(&self) -> SyncResult<()> {
        check("pthread_rwlock_unlock", unsafe {
            libc::pthread_rwlock_unlock(self.native.get())
        })
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native.release(|raw| {
            check("pthread_rwlock_destroy", unsafe {
                libc::pthread_rwlock_destroy(raw)
            })
        })
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ============================================================================
// Semaphore
// ============================================================================

pub(crate) struct Semaphore {
    native: Native<libc::sem_t>,
}

// SAFETY: see `Mutex`.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub(crate) fn new(initial: u32) -> SyncResult<Self> {
        let native = Native::new("sem_init", |raw| {
            if unsafe { libc::sem_init(raw, 0, initial as c_uint) } == 0 {
                0
            } else {
                last_errno()
            }
        })?;
        Ok(Self { native })
    }

    pub(crate) fn wait(&self) -> SyncResult<()> {
        loop {
            if unsafe { libc::sem_wait(self.native.get()) } == 0 {
                return Ok(());
            }
            match last_errno() {
                libc::EINTR => continue,
                code => return Err(SyncError::native("sem_wait", code)),
            }
        }
    }

    /// `Ok(false)` when the deadline passed first.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        // sem_timedwait only measures CLOCK_REALTIME.
        let abstime = deadline_on(libc::CLOCK_REALTIME, timeout)?;
        loop {
            if unsafe { libc::sem_timedwait(self.native.get(), &abstime) } == 0 {
                return Ok(true);
            }
            match last_errno() {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return Ok(false),
                code => return Err(SyncError::native("sem_timedwait", code)),
            }
        }
    }

    pub(crate) fn signal(&self) -> SyncResult<()> {
        check_errno("sem_post", unsafe { libc::sem_post(self.native.get()) })
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native
            .release(|raw| check_errno("sem_destroy", unsafe { libc::sem_destroy(raw) }))
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ============================================================================
// CondVar
// ============================================================================

pub(crate) struct CondVar {
    native: Native<libc::pthread_cond_t>,
}

// SAFETY: see `Mutex`.
unsafe impl Send for CondVar {}
unsafe impl Sync for CondVar {}

impl CondVar {
    pub(crate) fn new() -> SyncResult<Self> {
        let native = Native::new("pthread_cond_init", |raw| unsafe {
            let mut attr: libc::pthread_condattr_t = mem::zeroed();
            let rc = libc::pthread_condattr_init(&mut attr);
            if rc != 0 {
                return rc;
            }
            // Timed waits measure CLOCK_MONOTONIC so wall clock steps do not
            // stretch or cut them short.
            let rc = libc::pthread_condattr_setclock(&mut attr, libc::CLOCK_MONOTONIC);
            let rc = if rc == 0 {
                libc::pthread_cond_init(raw, &attr)
            } else {
                rc
            };
            libc::pthread_condattr_destroy(&mut attr);
            rc
        })?;
        Ok(Self { native })
    }

    /// The caller must hold `mutex`.
    pub(crate) fn wait(&self, mutex: &Mutex) -> SyncResult<()> {
        check("pthread_cond_wait", unsafe {
            libc::pthread_cond_wait(self.native.get(), mutex.raw())
        })
    }

    /// The caller must hold `mutex`. `Ok(false)` when the deadline passed
    /// first; the mutex is held again in every case.
    pub(crate) fn wait_timeout(&self, mutex: &Mutex, timeout: Duration) -> SyncResult<bool> {
        let abstime = deadline_on(libc::CLOCK_MONOTONIC, timeout)?;
        match unsafe { libc::pthread_cond_timedwait(self.native.get(), mutex.raw(), &abstime) } {
            0 => Ok(true),
            libc::ETIMEDOUT => Ok(false),
            code => Err(SyncError::native("pthread_cond_timedwait", code)),
        }
    }

    pub(crate) fn notify_one(&self) -> SyncResult<()> {
        check("pthread_cond_signal", unsafe {
            libc::pthread_cond_signal(self.native.get())
        })
    }

    pub(crate) fn notify_all(&self) -> SyncResult<()> {
        check("pthread_cond_broadcast", unsafe {
            libc::pthread_cond_broadcast(self.native.get())
        })
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native.release(|raw| {
            check("pthread_cond_destroy", unsafe { libc::pthread_cond_destroy(raw) })
        })
    }
}

impl Drop for CondVar {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ============================================================================
// Barrier
// ============================================================================

pub(crate) struct Barrier {
    native: Native<libc::pthread_barrier_t>,
}

// SAFETY: see `Mutex`.
unsafe impl Send for Barrier {}
unsafe impl Sync for Barrier {}

impl Barrier {
    pub(crate) fn new(count: u32) -> SyncResult<Self> {
        let native = Native::new("pthread_barrier_init", |raw| unsafe {
            libc::pthread_barrier_init(raw, core::ptr::null(), count as c_uint)
        })?;
        Ok(Self { native })
    }

    /// Returns `true` for the arrival the platform designates as serial.
    pub(crate) fn wait(&self) -> SyncResult<bool> {
        match unsafe { libc::pthread_barrier_wait(self.native.get()) } {
            0 => Ok(false),
            BARRIER_SERIAL_THREAD => Ok(true),
            code => Err(SyncError::native("pthread_barrier_wait", code)),
        }
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        self.native.release(|raw| {
            check("pthread_barrier_destroy", unsafe {
                libc::pthread_barrier_destroy(raw)
            })
        })
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
