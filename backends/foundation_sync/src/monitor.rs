//! A mutex and a condition variable owned as one unit.
//!
//! Callers never see the internal mutex. Every `wait` takes a ticket when it
//! registers, and every `notify` takes the internal mutex and grants the
//! oldest registered ticket that has not been granted yet. A waiter returns
//! only for its own grant, so a thread that registers after a notify can
//! never take the wakeup meant for one that was already waiting, and a
//! notify with nobody registered is dropped.
//!
//! `notify_all` advances an epoch instead, releasing every ticket taken
//! before it.

use core::cell::UnsafeCell;
use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::time::Instant;

use crate::condvar::{CondVar, WaitOutcome};
use crate::errors::SyncResult;
use crate::mutex::{Mutex, MutexGuard};

/// A ticket handed to `notify` together with the first ticket number that
/// registered after that notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grant {
    ticket: u64,
    horizon: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    ticket: u64,
    epoch: u64,
}

/// Registration bookkeeping. Only touched with the monitor mutex held.
#[derive(Debug, Default)]
struct WaitQueue {
    next_ticket: u64,
    /// Registered and not yet granted, oldest first.
    pending: VecDeque<u64>,
    /// Granted and not yet consumed by their waiter.
    granted: Vec<Grant>,
    epoch: u64,
}

impl WaitQueue {
    fn register(&mut self) -> Registration {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.push_back(ticket);
        Registration {
            ticket,
            epoch: self.epoch,
        }
    }

    /// Grants the oldest pending ticket. `false` when nobody is registered.
    fn grant_oldest(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(ticket) => {
                self.granted.push(Grant {
                    ticket,
                    horizon: self.next_ticket,
                });
                true
            }
            None => false,
        }
    }

    fn release_all(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.pending.clear();
        self.granted.clear();
    }

    /// Consumes the grant for `registration`, if it has one.
    fn take_grant(&mut self, registration: Registration) -> bool {
        if self.epoch != registration.epoch {
            return true;
        }
        match self
            .granted
            .iter()
            .position(|grant| grant.ticket == registration.ticket)
        {
            Some(index) => {
                self.granted.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Unregisters a waiter that leaves without consuming a grant.
    ///
    /// An unconsumed grant moves to the oldest pending ticket, but only if
    /// that ticket registered before the notify that made the grant. Returns
    /// `true` when a grant moved and its new owner must be woken.
    fn withdraw(&mut self, registration: Registration) -> bool {
        if self.epoch != registration.epoch {
            return false;
        }
        if let Some(index) = self
            .pending
            .iter()
            .position(|ticket| *ticket == registration.ticket)
        {
            self.pending.remove(index);
            return false;
        }
        let Some(index) = self
            .granted
            .iter()
            .position(|grant| grant.ticket == registration.ticket)
        else {
            return false;
        };

        let grant = self.granted.swap_remove(index);
        match self.pending.front().copied() {
            Some(ticket) if ticket < grant.horizon => {
                self.pending.pop_front();
                self.granted.push(Grant {
                    ticket,
                    horizon: grant.horizon,
                });
                true
            }
            _ => false,
        }
    }
}

pub struct Monitor {
    mutex: Mutex,
    condvar: CondVar,
    queue: UnsafeCell<WaitQueue>,
}

// SAFETY: `queue` is only reached through `Monitor::queue`, which requires a
// guard of the monitor mutex.
unsafe impl Sync for Monitor {}

impl Monitor {
    /// Creates the internal mutex and condition variable together.
    ///
    /// Both are always attempted; if either fails, the one that succeeded is
    /// destroyed again and the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the native failure of whichever part could not be created.
    pub fn new() -> SyncResult<Self> {
        let mutex = Mutex::new();
        let condvar = CondVar::new();

        match (mutex, condvar) {
            (Ok(mutex), Ok(condvar)) => {
                ewe_logs::debug!("[sync] monitor created");
                Ok(Self {
                    mutex,
                    condvar,
                    queue: UnsafeCell::new(WaitQueue::default()),
                })
            }
            (Ok(mutex), Err(err)) => {
                if let Err(rollback) = mutex.destroy() {
                    ewe_logs::warn!("[sync] monitor rollback of mutex failed: {}", rollback);
                }
                Err(err)
            }
            (Err(err), Ok(condvar)) => {
                if let Err(rollback) = condvar.destroy() {
                    ewe_logs::warn!("[sync] monitor rollback of condvar failed: {}", rollback);
                }
                Err(err)
            }
            (Err(err), Err(_)) => Err(err),
        }
    }

    /// Blocks until notified.
    ///
    /// # Errors
    ///
    /// Returns the native failure of the internal mutex or condvar.
    pub fn wait(&self) -> SyncResult<()> {
        self.wait_until(None).map(|_| ())
    }

    /// Blocks until notified or until `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns the native failure; running out of time is
    /// [`WaitOutcome::TimedOut`].
    pub fn wait_timeout(&self, timeout: Duration) -> SyncResult<WaitOutcome> {
        // An unrepresentable deadline waits without one.
        self.wait_until(Instant::now().checked_add(timeout))
    }

    /// Wakes the longest registered thread in `wait` that has not been
    /// notified yet. Without such a thread it does nothing.
    ///
    /// # Errors
    ///
    /// Returns the native failure of the internal mutex or condvar.
    pub fn notify(&self) -> SyncResult<()> {
        let mut guard = self.mutex.lock()?;
        // Every waiter sleeps on the one condvar, so the owner of the grant
        // is only reached by a broadcast; the others go back to sleep.
        let signalled = if self.queue(&mut guard).grant_oldest() {
            self.condvar.notify_all()
        } else {
            Ok(())
        };

        let unlocked = guard.unlock();
        signalled.and(unlocked)
    }

    /// Wakes every thread currently in `wait`.
    ///
    /// # Errors
    ///
    /// Returns the native failure of the internal mutex or condvar.
    pub fn notify_all(&self) -> SyncResult<()> {
        let mut guard = self.mutex.lock()?;
        self.queue(&mut guard).release_all();

        let broadcast = self.condvar.notify_all();
        let unlocked = guard.unlock();
        broadcast.and(unlocked)
    }

    /// Threads registered in `wait` that no notify has reached yet.
    ///
    /// # Errors
    ///
    /// Returns the native failure of the internal mutex.
    pub fn waiters(&self) -> SyncResult<usize> {
        let mut guard = self.mutex.lock()?;
        let waiting = self.queue(&mut guard).pending.len();
        guard.unlock()?;
        Ok(waiting)
    }

    /// Destroys the condition variable, then the mutex. Both are always
    /// attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        let condvar = self.condvar.destroy();
        let mutex = self.mutex.destroy();
        ewe_logs::debug!("[sync] monitor destroyed");
        condvar.and(mutex)
    }

    fn queue<'g>(&'g self, held: &'g mut MutexGuard<'_>) -> &'g mut WaitQueue {
        debug_assert!(core::ptr::eq(held.mutex(), &self.mutex));
        // SAFETY: `held` proves the monitor mutex is locked, and the mutable
        // borrow of it keeps a second queue reference from coexisting.
        unsafe { &mut *self.queue.get() }
    }

    fn wait_until(&self, deadline: Option<Instant>) -> SyncResult<WaitOutcome> {
        let mut guard = self.mutex.lock()?;
        let registration = self.queue(&mut guard).register();

        match self.await_grant(&mut guard, registration, deadline) {
            Ok(outcome) => {
                guard.unlock()?;
                Ok(outcome)
            }
            Err(err) => {
                if self.queue(&mut guard).withdraw(registration) {
                    if let Err(wake) = self.condvar.notify_all() {
                        ewe_logs::warn!("[sync] monitor could not pass on a grant: {}", wake);
                    }
                }
                Err(err)
            }
        }
    }

    /// Loops on the condvar until this registration is granted. Runs with
    /// the monitor mutex held except while parked in the condvar.
    fn await_grant(
        &self,
        guard: &mut MutexGuard<'_>,
        registration: Registration,
        deadline: Option<Instant>,
    ) -> SyncResult<WaitOutcome> {
        loop {
            if self.queue(guard).take_grant(registration) {
                return Ok(WaitOutcome::Notified);
            }

            match deadline {
                None => self.condvar.wait(guard)?,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        // Still pending, so withdrawing hands nothing on.
                        self.queue(guard).withdraw(registration);
                        return Ok(WaitOutcome::TimedOut);
                    }
                    // The grant decides; the condvar outcome only tells
                    // whether to look at the clock again.
                    self.condvar.wait_timeout(guard, remaining)?;
                }
            }
        }
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn wait_for_waiters(monitor: &Monitor, count: usize) {
        while monitor.waiters().expect("waiters") < count {
            thread::yield_now();
        }
    }

    #[test]
    fn test_create_destroy() {
        let monitor = Monitor::new().expect("create");
        monitor.destroy().expect("destroy");
    }

    /// WHY: Notify with no waiter must not be stored for a later waiter
    /// WHAT: notify first, then a timed wait still times out
    #[test]
    fn test_notify_without_waiter_is_dropped() {
        let monitor = Monitor::new().expect("create");
        monitor.notify().expect("notify");
        let outcome = monitor
            .wait_timeout(Duration::from_millis(20))
            .expect("wait_timeout");
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    /// WHY: A timed-out waiter must leave the queue consistent
    /// WHAT: After a timeout nobody is registered or granted
    #[test]
    fn test_timeout_unregisters_waiter() {
        let monitor = Monitor::new().expect("create");
        assert!(monitor
            .wait_timeout(Duration::from_millis(10))
            .expect("wait_timeout")
            .timed_out());
        assert_eq!(monitor.waiters().expect("waiters"), 0);
    }

    /// WHY: A notify belongs to a thread that was already waiting
    /// WHAT: A waiter registered after the notify times out while the one
    /// registered before it is woken
    #[test]
    #[ntest::timeout(20000)]
    fn test_late_waiter_cannot_take_earlier_notify() {
        for _ in 0..50 {
            let monitor = Arc::new(Monitor::new().expect("create"));
            let early = {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || monitor.wait_timeout(Duration::from_secs(5)))
            };
            wait_for_waiters(&monitor, 1);

            monitor.notify().expect("notify");
            let late = monitor
                .wait_timeout(Duration::from_millis(20))
                .expect("late wait");

            assert_eq!(late, WaitOutcome::TimedOut);
            assert_eq!(
                early.join().expect("thread").expect("early wait"),
                WaitOutcome::Notified
            );
        }
    }

    /// WHY: notify_all must release everyone registered before it
    /// WHAT: Three waiters, one broadcast, all three return
    #[test]
    fn test_notify_all_releases_registered_waiters() {
        let monitor = Arc::new(Monitor::new().expect("create"));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || monitor.wait_timeout(Duration::from_secs(10)))
            })
            .collect();

        wait_for_waiters(&monitor, 3);
        monitor.notify_all().expect("notify_all");

        for waiter in waiters {
            assert_eq!(
                waiter.join().expect("thread").expect("wait"),
                WaitOutcome::Notified
            );
        }
    }

    #[test]
    fn test_queue_grants_oldest_first() {
        let mut queue = WaitQueue::default();
        let first = queue.register();
        let second = queue.register();

        assert!(queue.grant_oldest());
        assert!(!queue.take_grant(second));
        assert!(queue.take_grant(first));
        assert!(!queue.take_grant(first));
    }

    /// WHY: A grant left behind by a failing waiter must not go to a thread
    /// that registered after the notify
    /// WHAT: It moves to an older pending ticket, and is dropped otherwise
    #[test]
    fn test_withdrawn_grant_moves_only_to_older_ticket() {
        let mut queue = WaitQueue::default();
        let first = queue.register();
        let second = queue.register();
        assert!(queue.grant_oldest());
        let late = queue.register();

        assert!(queue.withdraw(first));
        assert!(queue.take_grant(second));

        assert!(queue.grant_oldest());
        assert!(!queue.withdraw(late));
        assert!(queue.granted.is_empty());
        assert!(queue.pending.is_empty());

        let early = queue.register();
        assert!(queue.grant_oldest());
        let newcomer = queue.register();
        assert!(!queue.withdraw(early));
        assert!(!queue.take_grant(newcomer));
        assert_eq!(queue.pending.len(), 1);
    }

    #[test]
    fn test_release_all_covers_earlier_tickets() {
        let mut queue = WaitQueue::default();
        let before = queue.register();
        queue.release_all();
        let after = queue.register();

        assert!(queue.take_grant(before));
        assert!(!queue.take_grant(after));
        assert!(!queue.withdraw(before));
    }
}
