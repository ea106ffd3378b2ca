//! Helpers shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Counter that a test thread can block on until it reaches a value.
pub(crate) struct Latch {
    count: AtomicUsize,
    tick_tx: Sender<()>,
    tick_rx: Receiver<()>,
}

impl Latch {
    pub(crate) fn new() -> Self {
        let (tick_tx, tick_rx) = unbounded();
        Self {
            count: AtomicUsize::new(0),
            tick_tx,
            tick_rx,
        }
    }

    pub(crate) fn count_up(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let _ = self.tick_tx.send(());
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until the count is at least `target`. Returns false on timeout.
    pub(crate) fn wait_for(&self, target: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.count() < target {
            if self.tick_rx.recv_deadline(deadline).is_err() {
                return self.count() >= target;
            }
        }
        true
    }
}
