//! Countdown latch joining the two drain tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Opens once it has been counted down `count` times.
#[derive(Debug)]
pub struct CountdownLatch {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        })
    }

    /// Decrement the count. Extra calls after reaching zero are ignored.
    pub fn count_down(&self) {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.notify.notify_waiters();
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// A guard that counts down once when dropped, including during unwind.
    pub fn guard(self: &Arc<Self>) -> LatchGuard {
        LatchGuard {
            latch: Arc::clone(self),
        }
    }
}

pub struct LatchGuard {
    latch: Arc<CountdownLatch>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
