//! Lost-wakeup stress for [`CondVar`].

use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use foundation_sync::{Barrier, CondVar, Mutex, SyncResult};

/// Outcome of [`run_condvar_handshakes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    pub rounds: usize,
    /// Rounds where the waiter ran out of patience without seeing the signal
    pub missed: usize,
}

/// Runs `rounds` signal handshakes between one waiter and one signaller.
///
/// Each round the waiter takes the mutex, meets the signaller at a
/// two-party barrier while still holding it, and then waits on the condvar.
/// The signaller can only take the mutex once the waiter is parked, so every
/// signal is sent to a registered waiter and a miss means a lost wakeup.
///
/// # Errors
///
/// Returns the first native failure of either side.
///
/// # Panics
///
/// Panics if the waiter thread panics.
pub fn run_condvar_handshakes(rounds: usize, patience: Duration) -> SyncResult<HandshakeReport> {
    let mutex = Arc::new(Mutex::new()?);
    let condvar = Arc::new(CondVar::new()?);
    let ready = Arc::new(Barrier::new(2)?);
    let signalled = Arc::new(AtomicBool::new(false));

    let waiter = {
        let (mutex, condvar, ready, signalled) = (
            Arc::clone(&mutex),
            Arc::clone(&condvar),
            Arc::clone(&ready),
            Arc::clone(&signalled),
        );
        thread::spawn(move || -> SyncResult<usize> {
            let mut missed = 0;
            for _ in 0..rounds {
                let mut guard = mutex.lock()?;
                ready.wait()?;
                while !signalled.load(Ordering::Relaxed) {
                    let outcome = condvar.wait_timeout(&mut guard, patience)?;
                    if outcome.timed_out() && !signalled.load(Ordering::Relaxed) {
                        missed += 1;
                        break;
                    }
                }
                signalled.store(false, Ordering::Relaxed);
                guard.unlock()?;
            }
            Ok(missed)
        })
    };

    let signaller = (|| -> SyncResult<()> {
        for _ in 0..rounds {
            ready.wait()?;
            let guard = mutex.lock()?;
            signalled.store(true, Ordering::Relaxed);
            condvar.notify_one()?;
            guard.unlock()?;
        }
        Ok(())
    })();

    let missed = waiter.join().expect("waiter thread panicked")?;
    signaller?;

    Ok(HandshakeReport { rounds, missed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(30000)]
    fn test_short_handshake_run() {
        let report = run_condvar_handshakes(50, Duration::from_secs(5)).expect("scenario");
        assert_eq!(report.rounds, 50);
        assert_eq!(report.missed, 0);
    }
}
