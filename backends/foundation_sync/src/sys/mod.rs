//! Native backends. Each one exposes the same set of types and functions
//! (`Mutex`, `Spinlock`, `RwLock`, `Semaphore`, `CondVar`, `Barrier`,
//! `clock_ticks`, `clock_frequency`) so the public facades stay
//! platform-neutral.

#[cfg(target_os = "linux")]
mod posix;

#[cfg(target_os = "linux")]
pub(crate) use posix::*;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub(crate) use windows::*;

#[cfg(not(any(target_os = "linux", windows)))]
compile_error!("foundation_sync supports Linux (pthreads) and Windows (Win32) targets only");
