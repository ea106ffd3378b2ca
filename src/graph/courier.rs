//! Waitable notification queues.
//!
//! A [`Courier`] is the delivery queue a subscription posts into. Each session
//! owns one courier and is its only consumer; any number of threads may post.
//! Notifications travel through one channel tagged with their class; a drain
//! splits them into expedited and normal batches, each in FIFO order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Notification;

/// Notifications drained from a courier in one wake-up.
#[derive(Debug, Default)]
pub struct NotifyBatch {
    pub expedited: Vec<Notification>,
    pub normal: Vec<Notification>,
}

impl NotifyBatch {
    pub fn is_empty(&self) -> bool {
        self.expedited.is_empty() && self.normal.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expedited.len() + self.normal.len()
    }

    /// Expedited notifications first, then normal ones, each in FIFO order.
    pub fn into_ordered(self) -> impl Iterator<Item = Notification> {
        self.expedited.into_iter().chain(self.normal)
    }
}

enum Envelope {
    Notify { note: Notification, expedite: bool },
    /// Wakes a consumer blocked in `recv` after `close`.
    Close,
}

struct CourierInner {
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
    closed: AtomicBool,
}

/// A per-consumer notification queue.
#[derive(Clone)]
pub struct Courier {
    inner: Arc<CourierInner>,
}

impl Courier {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(CourierInner {
                sender,
                receiver,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a notification. Returns `false` if the courier is closed.
    pub(crate) fn post(&self, note: Notification, expedite: bool) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner
            .sender
            .send(Envelope::Notify { note, expedite })
            .is_ok()
    }

    /// Block until at least one notification is queued, then drain everything.
    ///
    /// Returns an empty batch only once the courier has been closed.
    pub fn wait(&self) -> NotifyBatch {
        if self.is_closed() {
            return NotifyBatch::default();
        }
        let first = self.inner.receiver.recv().ok();
        self.collect(first)
    }

    /// Like [`Courier::wait`], but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> NotifyBatch {
        if self.is_closed() {
            return NotifyBatch::default();
        }
        let first = self.inner.receiver.recv_timeout(timeout).ok();
        self.collect(first)
    }

    /// Drain without blocking.
    pub fn try_drain(&self) -> NotifyBatch {
        self.collect(None)
    }

    fn collect(&self, first: Option<Envelope>) -> NotifyBatch {
        let mut batch = NotifyBatch::default();
        for envelope in first.into_iter().chain(self.inner.receiver.try_iter()) {
            if let Envelope::Notify { note, expedite } = envelope {
                if expedite {
                    batch.expedited.push(note);
                } else {
                    batch.normal.push(note);
                }
            }
        }
        if self.is_closed() {
            return NotifyBatch::default();
        }
        batch
    }

    /// Close the queue: pending notifications are discarded, later posts are
    /// dropped and a blocked waiter wakes up.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in self.inner.receiver.try_iter() {}
        let _ = self.inner.sender.send(Envelope::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of queued notifications.
    pub fn pending(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.inner.receiver.len()
        }
    }

    /// Whether two handles refer to the same queue.
    pub fn same_queue(&self, other: &Courier) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Courier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Courier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Courier")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
