//! Completion and cancellation primitives shared by both backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counts down once per finished task and wakes the runner when the count
/// reaches zero. The counter is the only genuinely contended resource in a
/// benchmark run, so the decrement is a single atomic; the mutex/condvar pair
/// only coordinates sleepers.
pub struct CountdownLatch {
    remaining: AtomicUsize,
    lock: Mutex<()>,
    cond: Condvar,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Signals one completion. Each task must call this exactly once.
    pub fn count_down(&self) {
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "count_down called more times than the latch count");
        if prev == 1 {
            // Taking the lock before notifying closes the race against a
            // waiter that has checked the counter but not yet parked.
            let _guard = self.lock.lock().expect("latch mutex poisoned");
            self.cond.notify_all();
        }
    }

    /// Blocks until the count reaches zero or `timeout` elapses. Returns
    /// `true` when the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().expect("latch mutex poisoned");
        while self.remaining() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .cond
                .wait_timeout(guard, deadline - now)
                .expect("latch mutex poisoned");
            guard = next;
        }
        true
    }
}

/// One-shot cancellation flag with an interruptible sleep, used by the
/// blocking I/O task. Cancellation wakes every sleeper promptly.
#[derive(Default)]
pub struct CancelFlag {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock().expect("cancel mutex poisoned");
        *cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("cancel mutex poisoned")
    }

    /// Sleeps for up to `duration`, waking early on cancellation. Returns
    /// `true` when the full duration elapsed, `false` when interrupted.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.cancelled.lock().expect("cancel mutex poisoned");
        let (_guard, result) = self
            .cond
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .expect("cancel mutex poisoned");
        result.timed_out()
    }
}
