//! Stress test framework for the native synchronization primitives.
//!
//! Every worker thread meets the others at a native [`Barrier`] before its
//! first iteration, so contention starts at the same instant on all threads
//! instead of trickling in while threads are still being spawned.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use foundation_sync::{Barrier, SyncError, SyncResult};

pub mod config;
pub mod sync;

pub use config::StressConfig;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Operations that returned `Ok`
    pub successes: usize,
    /// Operations that returned an error
    pub failures: usize,
    /// Wall time from spawning the first worker to joining the last
    pub duration: Duration,
    /// Number of worker threads
    pub thread_count: usize,
    /// Rendered form of the first error any worker saw
    pub first_error: Option<String>,
}

impl StressResult {
    /// Creates a new stress test result.
    #[must_use]
    pub const fn new(
        successes: usize,
        failures: usize,
        duration: Duration,
        thread_count: usize,
    ) -> Self {
        Self {
            successes,
            failures,
            duration,
            thread_count,
            first_error: None,
        }
    }

    /// Returns the total number of operations.
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.successes + self.failures
    }

    /// Returns the success rate as a value between 0.0 and 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_operations() == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_operations() as f64
        }
    }

    /// `true` when every operation succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Spawns `thread_count` workers that run an operation repeatedly until the
/// iteration count or the optional duration is exhausted.
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    /// Creates a new stress test harness with the given configuration.
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs a stress test with the given operation closure.
    ///
    /// The closure receives the worker index (`0..thread_count`) and the
    /// iteration number on that worker, and reports failure through
    /// [`SyncError`].
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_sync::Mutex;
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    /// use std::sync::Arc;
    ///
    /// let mutex = Arc::new(Mutex::new().unwrap());
    /// let config = StressConfig::new().threads(4).iterations(100);
    ///
    /// let shared = Arc::clone(&mutex);
    /// let result = StressHarness::new(config)
    ///     .run(move |_thread_id, _iteration| shared.lock()?.unlock());
    ///
    /// assert_eq!(result.successes, 400);
    /// assert!(result.is_clean());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if any worker thread panics during the stress test execution.
    pub fn run<F>(self, operation: F) -> StressResult
    where
        F: Fn(usize, usize) -> SyncResult<()> + Send + Sync + 'static,
    {
        let thread_count = self.config.get_thread_count();
        tracing::debug!(
            threads = thread_count,
            iterations = self.config.get_iterations(),
            "stress run starting"
        );
        let start = std::time::Instant::now();
        let operation = Arc::new(operation);

        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let first_error = Arc::new(OnceLock::<String>::new());
        let stop_flag = Arc::new(AtomicBool::new(false));

        // A zero-thread run has nobody to gate.
        let gate = u32::try_from(thread_count)
            .ok()
            .filter(|parties| *parties > 0)
            .map(Barrier::new)
            .transpose();
        let gate = match gate {
            Ok(gate) => gate.map(Arc::new),
            Err(err) => {
                let mut result = StressResult::new(0, 1, start.elapsed(), thread_count);
                result.first_error = Some(err.to_string());
                return result;
            }
        };

        if let Some(duration) = self.config.get_duration() {
            let stop_flag_clone = Arc::clone(&stop_flag);
            thread::spawn(move || {
                thread::sleep(duration);
                stop_flag_clone.store(true, Ordering::Release);
            });
        }

        let mut handles = Vec::with_capacity(thread_count);

        for thread_id in 0..thread_count {
            let operation = Arc::clone(&operation);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);
            let first_error = Arc::clone(&first_error);
            let stop_flag = Arc::clone(&stop_flag);
            let gate = gate.clone();
            let iterations = self.config.get_iterations();

            let handle = thread::spawn(move || {
                let record = |err: SyncError| {
                    failures.fetch_add(1, Ordering::Relaxed);
                    let _ = first_error.set(err.to_string());
                };

                if let Some(gate) = gate {
                    if let Err(err) = gate.wait() {
                        record(err);
                        return;
                    }
                }

                for iteration in 0..iterations {
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }

                    match operation(thread_id, iteration) {
                        Ok(()) => {
                            successes.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => record(err),
                    }
                }
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.join().expect("Thread panicked during stress test");
        }

        let duration = start.elapsed();

        let mut result = StressResult::new(
            successes.load(Ordering::Relaxed),
            failures.load(Ordering::Relaxed),
            duration,
            thread_count,
        );
        result.first_error = first_error.get().cloned();
        if let Some(err) = &result.first_error {
            tracing::warn!(failures = result.failures, first_error = %err, "stress run saw failures");
        }
        result
    }
}
