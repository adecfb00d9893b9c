use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use foundation_sync::{Barrier, RwLock, SyncResult};
use foundation_testing::{StressConfig, StressHarness};

/// WHY: Readers must proceed simultaneously
/// WHAT: N readers meet at an N-party barrier while all hold the read lock;
/// the concurrent-reader high-water mark reaches N
#[test]
#[ntest::timeout(20000)]
fn test_readers_reach_high_water_mark() {
    const READERS: usize = 6;

    let lock = Arc::new(RwLock::new().expect("rwlock"));
    let inside = Arc::new(Barrier::new(READERS as u32).expect("barrier"));
    let active = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let (lock, inside, active, high_water) = (
                Arc::clone(&lock),
                Arc::clone(&inside),
                Arc::clone(&active),
                Arc::clone(&high_water),
            );
            thread::spawn(move || -> SyncResult<()> {
                let guard = lock.read()?;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                // Only returns if every reader holds the lock at once.
                inside.wait()?;
                active.fetch_sub(1, Ordering::SeqCst);
                guard.unlock()
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread").expect("reader");
    }
    assert_eq!(high_water.load(Ordering::SeqCst), READERS);
}

/// WHY: A writer never overlaps a reader or another writer
/// WHAT: Mixed readers and writers under stress record no overlap
#[test]
#[ntest::timeout(60000)]
fn test_writer_is_exclusive() {
    let lock = Arc::new(RwLock::new().expect("rwlock"));
    let readers = Arc::new(AtomicUsize::new(0));
    let writers = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let (shared_readers, shared_writers, shared_overlaps) = (
        Arc::clone(&readers),
        Arc::clone(&writers),
        Arc::clone(&overlaps),
    );
    let result = StressHarness::new(StressConfig::new().threads(8).iterations(2_000)).run(
        move |thread_id, iteration| {
            if (thread_id + iteration) % 4 == 0 {
                let guard = lock.write()?;
                let concurrent_writers = shared_writers.fetch_add(1, Ordering::SeqCst);
                if concurrent_writers != 0 || shared_readers.load(Ordering::SeqCst) != 0 {
                    shared_overlaps.fetch_add(1, Ordering::SeqCst);
                }
                shared_writers.fetch_sub(1, Ordering::SeqCst);
                guard.unlock()
            } else {
                let guard = lock.read()?;
                shared_readers.fetch_add(1, Ordering::SeqCst);
                if shared_writers.load(Ordering::SeqCst) != 0 {
                    shared_overlaps.fetch_add(1, Ordering::SeqCst);
                }
                shared_readers.fetch_sub(1, Ordering::SeqCst);
                guard.unlock()
            }
        },
    );

    assert!(result.is_clean(), "{:?}", result.first_error);
    assert_eq!(result.successes, 16_000);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(readers.load(Ordering::SeqCst), 0);
    assert_eq!(writers.load(Ordering::SeqCst), 0);
}

/// WHY: Timed acquisition has three outcomes
/// WHAT: Against a held writer both timed calls return None; once released
/// they succeed
#[test]
#[ntest::timeout(10000)]
fn test_timed_acquisition_against_writer() {
    let lock = Arc::new(RwLock::new().expect("rwlock"));
    let writer = lock.write().expect("write");

    let other = Arc::clone(&lock);
    let (read_timed_out, write_timed_out) = thread::spawn(move || {
        let read = other
            .read_timeout(Duration::from_millis(50))
            .expect("read_timeout")
            .is_none();
        let write = other
            .write_timeout(Duration::from_millis(50))
            .expect("write_timeout")
            .is_none();
        (read, write)
    })
    .join()
    .expect("thread");
    assert!(read_timed_out);
    assert!(write_timed_out);

    writer.unlock().expect("unlock");

    let other = Arc::clone(&lock);
    let acquired = thread::spawn(move || {
        let read = other
            .read_timeout(Duration::from_secs(1))
            .expect("read_timeout")
            .map(|guard| guard.unlock().is_ok());
        let write = other
            .write_timeout(Duration::from_secs(1))
            .expect("write_timeout")
            .map(|guard| guard.unlock().is_ok());
        read == Some(true) && write == Some(true)
    })
    .join()
    .expect("thread");
    assert!(acquired);
}
