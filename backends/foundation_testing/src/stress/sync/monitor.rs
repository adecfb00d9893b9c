//! Wakeup accounting for [`Monitor`].

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use foundation_sync::{Monitor, SyncResult, WaitOutcome};

/// Outcome of [`run_monitor_wakeups`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeupReport {
    pub waiters: usize,
    pub woken: usize,
    pub timed_out: usize,
    /// `notify` calls issued before every waiter returned
    pub notifies: usize,
}

/// Parks `waiters` threads in `Monitor::wait_timeout(patience)` and calls
/// `notify` until all of them have returned or `patience` runs out.
///
/// A notify that finds no registered waiter is dropped, so `notifies` may
/// exceed `waiters`; `woken` must still equal `waiters`.
///
/// # Errors
///
/// Returns the first native failure of the monitor.
///
/// # Panics
///
/// Panics if a waiter thread panics.
pub fn run_monitor_wakeups(waiters: usize, patience: Duration) -> SyncResult<WakeupReport> {
    let monitor = Arc::new(Monitor::new()?);
    let finished = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..waiters)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let outcome = monitor.wait_timeout(patience);
                finished.fetch_add(1, Ordering::SeqCst);
                outcome
            })
        })
        .collect();

    let deadline = Instant::now() + patience;
    let mut notifies = 0;
    while finished.load(Ordering::SeqCst) < waiters && Instant::now() < deadline {
        monitor.notify()?;
        notifies += 1;
        thread::yield_now();
    }

    let mut woken = 0;
    let mut timed_out = 0;
    for handle in handles {
        match handle.join().expect("waiter thread panicked")? {
            WaitOutcome::Notified => woken += 1,
            WaitOutcome::TimedOut => timed_out += 1,
        }
    }

    Ok(WakeupReport {
        waiters,
        woken,
        timed_out,
        notifies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(30000)]
    fn test_every_waiter_is_woken() {
        let report = run_monitor_wakeups(6, Duration::from_secs(10)).expect("scenario");
        assert_eq!(report.woken, 6);
        assert_eq!(report.timed_out, 0);
        assert!(report.notifies >= 6);
    }
}
