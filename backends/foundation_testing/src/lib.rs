//! Reusable stress testing infrastructure for the `foundation_sync` primitives.
//!
//! This crate provides:
//! - **Stress test framework**: Configurable high-contention runs whose
//!   operations report [`foundation_sync::SyncError`] on failure
//! - **Primitive scenarios**: Lock exclusion, semaphore capacity, condvar
//!   handshakes, monitor wakeups
//! - **Criterion benchmarks**: Native primitive costs next to `std::sync`
//!
//! # Examples
//!
//! ```rust
//! use foundation_sync::Mutex;
//! use foundation_testing::stress::sync::run_lock_exclusion;
//! use foundation_testing::StressConfig;
//!
//! let config = StressConfig::new()
//!     .threads(8)
//!     .iterations(1000);
//!
//! let report = run_lock_exclusion(Mutex::new().unwrap(), config);
//!
//! assert_eq!(report.observed, 8000); // 8 threads * 1000 iterations
//! assert!(report.is_exclusive());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod stress;

// Re-export commonly used items
pub use stress::{StressConfig, StressHarness, StressResult};
