use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use foundation_sync::{Barrier, Monitor, Mutex, RwLock, Semaphore, Spinlock};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Uncontended lock/unlock cost of the native locks next to `std::sync::Mutex`.
fn bench_uncontended_locks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock_unlock");

    let mutex = Mutex::new().unwrap();
    group.bench_function("native_mutex", |b| {
        b.iter(|| mutex.lock().unwrap().unlock().unwrap());
    });

    let spinlock = Spinlock::new().unwrap();
    group.bench_function("native_spinlock", |b| {
        b.iter(|| spinlock.lock().unwrap().unlock().unwrap());
    });

    let rwlock = RwLock::new().unwrap();
    group.bench_function("native_rwlock_read", |b| {
        b.iter(|| rwlock.read().unwrap().unlock().unwrap());
    });
    group.bench_function("native_rwlock_write", |b| {
        b.iter(|| rwlock.write().unwrap().unlock().unwrap());
    });

    let std_mutex = std::sync::Mutex::new(0u64);
    group.bench_function("std_mutex", |b| {
        b.iter(|| {
            let mut guard = std_mutex.lock().unwrap();
            *guard = black_box(*guard + 1);
        });
    });

    group.finish();
}

/// Signal then wait on one thread: the cost of a permit round trip.
fn bench_semaphore_round_trip(c: &mut Criterion) {
    let semaphore = Semaphore::new(0).unwrap();
    c.bench_function("semaphore_signal_wait", |b| {
        b.iter(|| {
            semaphore.signal().unwrap();
            semaphore.wait().unwrap();
        });
    });
}

/// Notify with nobody waiting still takes the monitor mutex.
fn bench_monitor_idle_notify(c: &mut Criterion) {
    let monitor = Monitor::new().unwrap();
    c.bench_function("monitor_notify_no_waiters", |b| {
        b.iter(|| monitor.notify().unwrap());
    });
}

/// Four threads contending on one native mutex.
fn bench_contended_mutex(c: &mut Criterion) {
    c.bench_function("native_mutex_4_threads_1000_each", |b| {
        b.iter_batched(
            || Arc::new(Mutex::new().unwrap()),
            |mutex| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        let mutex = Arc::clone(&mutex);
                        thread::spawn(move || {
                            for _ in 0..1000 {
                                mutex.lock().unwrap().unlock().unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

/// One rendezvous of four threads.
fn bench_barrier_round(c: &mut Criterion) {
    c.bench_function("barrier_4_parties", |b| {
        b.iter_batched(
            || Arc::new(Barrier::new(4).unwrap()),
            |barrier| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || barrier.wait().unwrap().is_leader())
                    })
                    .collect();
                let leaders = handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .filter(|leader| *leader)
                    .count();
                black_box(leaders);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets =
        bench_uncontended_locks,
        bench_semaphore_round_trip,
        bench_monitor_idle_notify,
        bench_contended_mutex,
        bench_barrier_round
}
criterion_main!(benches);
