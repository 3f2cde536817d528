use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use parley_types::models::PendingMessage;

/// Bounded in-memory buffer of messages awaiting persistence.
///
/// Producers never block: a full buffer is reported to the caller, who owns
/// the backpressure decision. Messages leave only through [`drain_all`].
///
/// [`drain_all`]: BatchQueue::drain_all
pub struct BatchQueue {
    tx: Sender<PendingMessage>,
    rx: Receiver<PendingMessage>,
    capacity: usize,
}

impl BatchQueue {
    pub fn new(capacity: usize) -> Self {
        // bounded(0) would be a rendezvous channel, which can never buffer
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Non-blocking insert. Returns `false` when the buffer is full; the
    /// message is discarded in that case.
    pub fn enqueue(&self, message: PendingMessage) -> bool {
        self.try_enqueue(message).is_ok()
    }

    /// Like [`enqueue`](Self::enqueue) but hands the message back on
    /// saturation so the caller can retry it.
    pub fn try_enqueue(&self, message: PendingMessage) -> Result<(), PendingMessage> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(m)) | Err(TrySendError::Disconnected(m)) => Err(m),
        }
    }

    /// Pending count. May be stale by the time the caller reads it.
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return everything currently buffered, oldest first.
    ///
    /// Takes at most one buffer's worth so a steady stream of producers
    /// cannot keep a drain running forever.
    pub fn drain_all(&self) -> Vec<PendingMessage> {
        self.rx.try_iter().take(self.capacity).collect()
    }
}
