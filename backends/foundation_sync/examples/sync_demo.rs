//! Walks through the primitives once: timing a computation, guarding a
//! counter with a mutex and with a semaphore, and handing work between two
//! threads through a monitor.
//!
//! ```bash
//! cargo run -p foundation_sync --example sync_demo
//! ```
//!
//! The log filter comes from the runtime config in `main`, not `RUST_LOG`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use foundation_sync::{
    LoggingConfig, Monitor, Mutex, Semaphore, SyncConfig, SyncResult, SyncRuntime,
};

const WORKERS: usize = 4;
const ROUNDS: u64 = 10_000;

fn fibonacci(n: u32) -> u64 {
    let (mut current, mut next) = (0u64, 1u64);
    for _ in 0..n {
        let sum = current.wrapping_add(next);
        current = next;
        next = sum;
    }
    current
}

fn timed_fibonacci(runtime: &SyncRuntime) -> SyncResult<()> {
    let timer = runtime.timer()?;
    let start = timer.now();
    let mut checksum = 0u64;
    for n in 0..5_000 {
        checksum = checksum.wrapping_add(fibonacci(n % 90));
    }
    let end = timer.now();

    tracing::info!(
        checksum,
        seconds = timer.elapsed_seconds(start, end),
        "fibonacci batch finished"
    );
    Ok(())
}

fn mutex_section() -> SyncResult<()> {
    let mutex = Arc::new(Mutex::new()?);
    let counter = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let (mutex, counter) = (Arc::clone(&mutex), Arc::clone(&counter));
            thread::spawn(move || -> SyncResult<()> {
                for _ in 0..ROUNDS {
                    let guard = mutex.lock()?;
                    // Split load/store: only correct under the lock.
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    guard.unlock()?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("mutex worker panicked")?;
    }

    tracing::info!(
        total = counter.load(Ordering::Relaxed),
        expected = WORKERS as u64 * ROUNDS,
        "mutex section done"
    );
    Ok(())
}

fn semaphore_section() -> SyncResult<()> {
    let semaphore = Arc::new(Semaphore::new(1)?);
    let counter = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let (semaphore, counter) = (Arc::clone(&semaphore), Arc::clone(&counter));
            thread::spawn(move || -> SyncResult<()> {
                for _ in 0..ROUNDS {
                    semaphore.wait()?;
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    semaphore.signal()?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("semaphore worker panicked")?;
    }

    tracing::info!(
        total = counter.load(Ordering::Relaxed),
        expected = WORKERS as u64 * ROUNDS,
        "semaphore section done"
    );
    Arc::try_unwrap(semaphore).map_or(Ok(()), Semaphore::destroy)
}

fn monitor_handoff() -> SyncResult<()> {
    let monitor = Arc::new(Monitor::new()?);
    let produced = Arc::new(AtomicU64::new(0));

    let consumer = {
        let (monitor, produced) = (Arc::clone(&monitor), Arc::clone(&produced));
        thread::spawn(move || -> SyncResult<u64> {
            while monitor.wait_timeout(Duration::from_millis(20))?.timed_out() {
                tracing::debug!("consumer still waiting");
            }
            Ok(produced.load(Ordering::SeqCst))
        })
    };

    produced.store(42, Ordering::SeqCst);
    // A notify with nobody waiting is dropped, so keep notifying until the
    // consumer has taken one.
    while !consumer.is_finished() {
        monitor.notify()?;
        thread::sleep(Duration::from_millis(5));
    }

    let value = consumer.join().expect("consumer panicked")?;
    tracing::info!(value, "monitor hand-off received");
    Ok(())
}

fn main() -> SyncResult<()> {
    let mut runtime = SyncRuntime::new(SyncConfig {
        logging: LoggingConfig {
            install_subscriber: true,
            filter: String::from("info,foundation_sync=debug"),
            json: false,
        },
    });
    runtime.init()?;

    timed_fibonacci(&runtime)?;
    mutex_section()?;
    semaphore_section()?;
    monitor_handoff()?;

    runtime.shutdown();
    Ok(())
}
