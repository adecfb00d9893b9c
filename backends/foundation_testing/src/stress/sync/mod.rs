//! Stress scenarios for the native primitives.

pub mod condvar;
pub mod locks;
pub mod monitor;
pub mod semaphore;

pub use condvar::{run_condvar_handshakes, HandshakeReport};
pub use locks::{run_lock_exclusion, ExclusionReport, UnguardedCounter};
pub use monitor::{run_monitor_wakeups, WakeupReport};
pub use semaphore::{run_semaphore_bound, SemaphoreBoundReport};
