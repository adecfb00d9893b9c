//! Capacity stress for [`Semaphore`].

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use foundation_sync::{Semaphore, SyncResult};

use crate::stress::{StressConfig, StressHarness, StressResult};

/// Outcome of [`run_semaphore_bound`].
#[derive(Debug, Clone)]
pub struct SemaphoreBoundReport {
    pub capacity: u32,
    /// Most workers ever inside the semaphore at once
    pub high_water: usize,
    pub stress: StressResult,
}

impl SemaphoreBoundReport {
    /// The capacity was never exceeded and no operation failed.
    #[must_use]
    pub fn within_bound(&self) -> bool {
        self.high_water <= self.capacity as usize && self.stress.is_clean()
    }
}

/// Workers repeatedly take a permit, stay inside for `hold`, and give it back,
/// while the scenario tracks how many are inside at once.
///
/// # Errors
///
/// Fails only if the semaphore cannot be created; per-iteration failures are
/// counted in the report.
pub fn run_semaphore_bound(
    capacity: u32,
    config: StressConfig,
    hold: Duration,
) -> SyncResult<SemaphoreBoundReport> {
    let semaphore = Arc::new(Semaphore::new(capacity)?);
    let inside = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let (shared_inside, shared_high) = (Arc::clone(&inside), Arc::clone(&high_water));
    let stress = StressHarness::new(config).run(move |_thread_id, _iteration| {
        semaphore.wait()?;
        let now = shared_inside.fetch_add(1, Ordering::SeqCst) + 1;
        shared_high.fetch_max(now, Ordering::SeqCst);
        if !hold.is_zero() {
            thread::sleep(hold);
        }
        shared_inside.fetch_sub(1, Ordering::SeqCst);
        semaphore.signal()
    });

    Ok(SemaphoreBoundReport {
        capacity,
        high_water: high_water.load(Ordering::SeqCst),
        stress,
    })
}
