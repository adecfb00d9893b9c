//! Win32 backend: slim reader/writer locks, condition variables, kernel
//! semaphores, synchronization barriers and the performance counter.
//!
//! SRW locks, condition variables and barriers are user-mode objects that
//! must stay at a fixed address, so each one is boxed. Only the semaphore
//! owns a kernel handle.

use core::cell::UnsafeCell;
use core::time::Duration;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_INVALID_PARAMETER, ERROR_TIMEOUT, HANDLE, WAIT_FAILED,
    WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Performance::{QueryPerformanceCounter, QueryPerformanceFrequency};
use windows_sys::Win32::System::Threading::{
    AcquireSRWLockExclusive, AcquireSRWLockShared, CreateSemaphoreW, DeleteSynchronizationBarrier,
    EnterSynchronizationBarrier, InitializeConditionVariable, InitializeSynchronizationBarrier,
    ReleaseSRWLockExclusive, ReleaseSRWLockShared, ReleaseSemaphore, SleepConditionVariableSRW,
    TryAcquireSRWLockExclusive, TryAcquireSRWLockShared, WaitForSingleObject,
    WakeAllConditionVariable, WakeConditionVariable, CONDITION_VARIABLE, INFINITE, SRWLOCK,
    SRWLOCK_INIT, SYNCHRONIZATION_BARRIER,
};

use crate::deadline::relative_millis;
use crate::errors::{SyncError, SyncResult};

/// Largest count a Win32 semaphore can hold (`LONG`).
const SEMAPHORE_MAX: i32 = i32::MAX;

#[inline]
#[allow(clippy::cast_possible_wrap)]
fn last_error(operation: &'static str) -> SyncError {
    SyncError::native(operation, unsafe { GetLastError() } as i32)
}

// ============================================================================
// Clock
// ============================================================================

pub(crate) fn clock_frequency() -> SyncResult<i64> {
    let mut frequency: i64 = 0;
    if unsafe { QueryPerformanceFrequency(&mut frequency) } == 0 {
        return Err(last_error("QueryPerformanceFrequency"));
    }
    Ok(frequency)
}

pub(crate) fn clock_ticks() -> i64 {
    let mut ticks: i64 = 0;
    // Cannot fail on Windows XP and later.
    let rc = unsafe { QueryPerformanceCounter(&mut ticks) };
    debug_assert_ne!(rc, 0, "QueryPerformanceCounter must succeed");
    ticks
}

/// A point on the performance counter `timeout` from now.
fn counter_deadline(timeout: Duration) -> SyncResult<i64> {
    let frequency = i128::from(clock_frequency()?);
    let offset = (timeout.as_nanos() as i128).saturating_mul(frequency) / 1_000_000_000;
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    Ok(clock_ticks().saturating_add(offset))
}

// ============================================================================
// SRW based exclusive locks
// ============================================================================

struct Srw {
    cell: Box<UnsafeCell<SRWLOCK>>,
}

impl Srw {
    fn new() -> Self {
        Self {
            cell: Box::new(UnsafeCell::new(SRWLOCK_INIT)),
        }
    }

    #[inline]
    fn get(&self) -> *mut SRWLOCK {
        self.cell.get()
    }

    fn try_exclusive(&self) -> bool {
        unsafe { TryAcquireSRWLockExclusive(self.get()) != 0 }
    }

    fn try_shared(&self) -> bool {
        unsafe { TryAcquireSRWLockShared(self.get()) != 0 }
    }

    /// Polls `try_acquire` until it succeeds or the counter passes the
    /// deadline. SRW locks have no native timed acquisition.
    fn poll_until(&self, timeout: Duration, try_acquire: impl Fn(&Self) -> bool) -> SyncResult<bool> {
        let deadline = counter_deadline(timeout)?;
        loop {
            if try_acquire(self) {
                return Ok(true);
            }
            if clock_ticks() >= deadline {
                return Ok(false);
            }
            std::thread::yield_now();
        }
    }
}

// SAFETY: SRW locks are shared between threads by design and never move
// out of their box.
unsafe impl Send for Srw {}
unsafe impl Sync for Srw {}

pub(crate) struct Mutex {
    srw: Srw,
}

impl Mutex {
    pub(crate) fn new() -> SyncResult<Self> {
        Ok(Self { srw: Srw::new() })
    }

    #[inline]
    pub(crate) fn raw(&self) -> *mut SRWLOCK {
        self.srw.get()
    }

    pub(crate) fn lock(&self) -> SyncResult<()> {
        unsafe { AcquireSRWLockExclusive(self.raw()) };
        Ok(())
    }

    pub(crate) fn try_lock(&self) -> SyncResult<bool> {
        Ok(self.srw.try_exclusive())
    }

    pub(crate) fn unlock(&self) -> SyncResult<()> {
        unsafe { ReleaseSRWLockExclusive(self.raw()) };
        Ok(())
    }

    /// SRW locks need no teardown beyond freeing their storage.
    pub(crate) fn destroy(self) -> SyncResult<()> {
        Ok(())
    }
}

pub(crate) struct Spinlock {
    srw: Srw,
}

impl Spinlock {
    pub(crate) fn new() -> SyncResult<Self> {
        Ok(Self { srw: Srw::new() })
    }

    pub(crate) fn lock(&self) -> SyncResult<()> {
        while !self.srw.try_exclusive() {
            core::hint::spin_loop();
        }
        Ok(())
    }

    pub(crate) fn try_lock(&self) -> SyncResult<bool> {
        Ok(self.srw.try_exclusive())
    }

    pub(crate) fn unlock(&self) -> SyncResult<()> {
        unsafe { ReleaseSRWLockExclusive(self.srw.get()) };
        Ok(())
    }

    pub(crate) fn destroy(self) -> SyncResult<()> {
        Ok(())
    }
}

pub(crate) struct RwLock {
    srw: Srw,
}

impl RwLock {
    pub(crate) fn new() -> SyncResult<Self> {
        Ok(Self { srw: Srw::new() })
    }

    pub(crate) fn read(&self) -> SyncResult<()> {
        unsafe { AcquireSRWLockShared(self.srw.get()) };
        Ok(())
    }

    pub(crate) fn write(&self) -> SyncResult<()> {
        unsafe { AcquireSRWLockExclusive(self.srw.get()) };
        Ok(())
    }

    pub(crate) fn read_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        self.srw.poll_until(timeout, Srw::try_shared)
    }

    pub(crate) fn write_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        self.srw.poll_until(timeout, Srw::try_exclusive)
    }

    pub(crate) fn unlock_read(&self) -> SyncResult<()> {
        unsafe { ReleaseSRWLockShared(self.srw.get()) };
        Ok(())
    }

    pub(crate) fn unlock_write(&self) -> SyncResult<()> {
        unsafe { ReleaseSRWLockExclusive(self.srw.get()) };
        Ok(())
    }

    pub(crate) fn destroy(self) -> SyncResult<()> {
        Ok(())
    }
}

// ============================================================================
// Semaphore
// ============================================================================

pub(crate) struct Semaphore {
    handle: HANDLE,
}

// SAFETY: a semaphore handle may be used from any thread.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub(crate) fn new(initial: u32) -> SyncResult<Self> {
        let initial = i32::try_from(initial)
            .map_err(|_| SyncError::native("CreateSemaphoreW", ERROR_INVALID_PARAMETER as i32))?;
        let handle = unsafe {
            CreateSemaphoreW(core::ptr::null(), initial, SEMAPHORE_MAX, core::ptr::null())
        };
        if handle.is_null() {
            return Err(last_error("CreateSemaphoreW"));
        }
        Ok(Self { handle })
    }

    pub(crate) fn wait(&self) -> SyncResult<()> {
        match unsafe { WaitForSingleObject(self.handle, INFINITE) } {
            WAIT_OBJECT_0 => Ok(()),
            WAIT_FAILED => Err(last_error("WaitForSingleObject")),
            #[allow(clippy::cast_possible_wrap)]
            other => Err(SyncError::native("WaitForSingleObject", other as i32)),
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> SyncResult<bool> {
        match unsafe { WaitForSingleObject(self.handle, relative_millis(timeout)) } {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            WAIT_FAILED => Err(last_error("WaitForSingleObject")),
            #[allow(clippy::cast_possible_wrap)]
            other => Err(SyncError::native("WaitForSingleObject", other as i32)),
        }
    }

    pub(crate) fn signal(&self) -> SyncResult<()> {
        if unsafe { ReleaseSemaphore(self.handle, 1, core::ptr::null_mut()) } == 0 {
            return Err(last_error("ReleaseSemaphore"));
        }
        Ok(())
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release()
    }

    fn release(&mut self) -> SyncResult<()> {
        if self.handle.is_null() {
            return Ok(());
        }
        let handle = core::mem::replace(&mut self.handle, core::ptr::null_mut());
        if unsafe { CloseHandle(handle) } == 0 {
            return Err(last_error("CloseHandle"));
        }
        Ok(())
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
    cell: Box<UnsafeCell<CONDITION_VARIABLE>>,
}

// SAFETY: see `Srw`.
unsafe impl Send for CondVar {}
unsafe impl Sync for CondVar {}

impl CondVar {
    pub(crate) fn new() -> SyncResult<Self> {
        // SAFETY: CONDITION_VARIABLE is plain old data; Initialize overwrites it.
        let cell: Box<UnsafeCell<CONDITION_VARIABLE>> =
            Box::new(UnsafeCell::new(unsafe { core::mem::zeroed() }));
        unsafe { InitializeConditionVariable(cell.get()) };
        Ok(Self { cell })
    }

    pub(crate) fn wait(&self, mutex: &Mutex) -> SyncResult<()> {
        if unsafe { SleepConditionVariableSRW(self.cell.get(), mutex.raw(), INFINITE, 0) } == 0 {
            return Err(last_error("SleepConditionVariableSRW"));
        }
        Ok(())
    }

    pub(crate) fn wait_timeout(&self, mutex: &Mutex, timeout: Duration) -> SyncResult<bool> {
        let millis = relative_millis(timeout);
        if unsafe { SleepConditionVariableSRW(self.cell.get(), mutex.raw(), millis, 0) } != 0 {
            return Ok(true);
        }
        match unsafe { GetLastError() } {
            ERROR_TIMEOUT => Ok(false),
            #[allow(clippy::cast_possible_wrap)]
            code => Err(SyncError::native("SleepConditionVariableSRW", code as i32)),
        }
    }

    pub(crate) fn notify_one(&self) -> SyncResult<()> {
        unsafe { WakeConditionVariable(self.cell.get()) };
        Ok(())
    }

    pub(crate) fn notify_all(&self) -> SyncResult<()> {
        unsafe { WakeAllConditionVariable(self.cell.get()) };
        Ok(())
    }

    pub(crate) fn destroy(self) -> SyncResult<()> {
        Ok(())
    }
}

// ============================================================================
// Barrier
// ============================================================================

pub(crate) struct Barrier {
    cell: Box<UnsafeCell<SYNCHRONIZATION_BARRIER>>,
    live: bool,
}

// SAFETY: see `Srw`.
unsafe impl Send for Barrier {}
unsafe impl Sync for Barrier {}

impl Barrier {
    pub(crate) fn new(count: u32) -> SyncResult<Self> {
        let count = i32::try_from(count).map_err(|_| {
            SyncError::native("InitializeSynchronizationBarrier", ERROR_INVALID_PARAMETER as i32)
        })?;
        // SAFETY: SYNCHRONIZATION_BARRIER is plain old data; Initialize overwrites it.
        let cell: Box<UnsafeCell<SYNCHRONIZATION_BARRIER>> =
            Box::new(UnsafeCell::new(unsafe { core::mem::zeroed() }));
        // -1 keeps the default spin count before blocking.
        if unsafe { InitializeSynchronizationBarrier(cell.get(), count, -1) } == 0 {
            return Err(last_error("InitializeSynchronizationBarrier"));
        }
        Ok(Self { cell, live: true })
    }

    pub(crate) fn wait(&self) -> SyncResult<bool> {
        Ok(unsafe { EnterSynchronizationBarrier(self.cell.get(), 0) } != 0)
    }

    pub(crate) fn destroy(mut self) -> SyncResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if self.live {
            self.live = false;
            // Always returns TRUE.
            unsafe { DeleteSynchronizationBarrier(self.cell.get()) };
        }
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.release();
    }
}
