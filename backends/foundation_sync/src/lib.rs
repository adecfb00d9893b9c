//! Native synchronization primitives behind one contract on Linux (pthreads)
//! and Windows (Win32).
//!
//! Every primitive follows the same lifecycle: `new` creates the native
//! object, acquire/release cycles map one-to-one onto native calls, and
//! `destroy` (or `Drop`) frees it exactly once. Failures come back as
//! [`SyncError`]; running out of time in a timed call is a separate outcome
//! (`Ok(None)` for locks, [`WaitOutcome::TimedOut`] for waits).
//!
//! ```rust
//! use foundation_sync::{Monitor, Mutex, SyncConfig, SyncRuntime};
//! use std::time::Duration;
//!
//! let mut runtime = SyncRuntime::new(SyncConfig::default());
//! runtime.init().unwrap();
//!
//! let timer = runtime.timer().unwrap();
//! let start = timer.now();
//!
//! let mutex = Mutex::new().unwrap();
//! mutex.lock().unwrap().unlock().unwrap();
//!
//! let monitor = Monitor::new().unwrap();
//! assert!(monitor.wait_timeout(Duration::from_millis(1)).unwrap().timed_out());
//!
//! assert!(timer.elapsed_seconds(start, timer.now()) >= 0.0);
//! runtime.shutdown();
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod sys;

pub mod barrier;
pub mod condvar;
pub mod config;
pub mod deadline;
pub mod errors;
pub mod lifecycle;
pub mod monitor;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;
pub mod timer;

pub use barrier::{Barrier, BarrierWaitResult};
pub use condvar::{CondVar, WaitOutcome};
pub use config::{ConfigError, LoggingConfig, SyncConfig};
pub use errors::{SyncError, SyncResult};
pub use lifecycle::SyncRuntime;
pub use monitor::Monitor;
pub use mutex::{Lock, Mutex, MutexGuard};
pub use rwlock::{ReadGuard, RwLock, WriteGuard};
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use timer::{Timer, Timestamp};
