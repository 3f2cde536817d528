use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};

use parley_types::models::PendingMessage;

use crate::config::PipelineConfig;
use crate::queue::BatchQueue;
use crate::store::MessageStore;

/// What happened to a submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Buffered on the first attempt.
    Queued,
    /// The queue was full; a forced flush made room and the retry succeeded.
    QueuedAfterFlush,
    /// The retry after the forced flush also found the queue full.
    Dropped,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        !matches!(self, Self::Dropped)
    }
}

/// Counters since the coordinator was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub persisted: u64,
    pub failed: u64,
    pub dropped: u64,
    pub flushes: u64,
}

/// Drains the [`BatchQueue`] into a [`MessageStore`], one drain at a time.
///
/// Flushes are triggered by queue size on [`submit`](Self::submit), by the
/// [`FlushTimer`](crate::FlushTimer), and by saturation. The drain guard is
/// only held across drain+persist, never across enqueue.
pub struct FlushCoordinator {
    queue: Arc<BatchQueue>,
    store: Arc<dyn MessageStore>,
    threshold: usize,
    drain_guard: Mutex<()>,
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
}

impl FlushCoordinator {
    pub fn new(queue: Arc<BatchQueue>, store: Arc<dyn MessageStore>, threshold: usize) -> Self {
        Self {
            queue,
            store,
            threshold: threshold.max(1),
            drain_guard: Mutex::new(()),
            persisted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &PipelineConfig, store: Arc<dyn MessageStore>) -> Self {
        Self::new(
            Arc::new(BatchQueue::new(config.queue_capacity)),
            store,
            config.flush_threshold,
        )
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Queue a message for persistence.
    ///
    /// On saturation this forces a flush on the calling thread and retries
    /// once. A concurrent producer can refill the buffer between the two, in
    /// which case the message is dropped and counted.
    pub fn submit(&self, message: PendingMessage) -> EnqueueOutcome {
        let outcome = match self.queue.try_enqueue(message) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(message) => {
                let flushed = self.flush();
                debug!("Batch queue saturated, forced flush persisted {} messages", flushed);

                match self.queue.try_enqueue(message) {
                    Ok(()) => EnqueueOutcome::QueuedAfterFlush,
                    Err(message) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            sender_id = message.sender_id,
                            target = message.target.target_id(),
                            message_type = %message.target.message_type(),
                            "Dropped message: queue refilled before retry after forced flush"
                        );
                        return EnqueueOutcome::Dropped;
                    }
                }
            }
        };

        if self.queue.size() >= self.threshold {
            self.flush();
        }

        outcome
    }

    /// Drain the queue and persist the batch. Returns how many messages were
    /// written.
    ///
    /// Concurrent callers wait for the running drain and then usually find
    /// the queue empty, returning 0.
    pub fn flush(&self) -> usize {
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self
            .drain_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let batch = self.queue.drain_all();
        if batch.is_empty() {
            return 0;
        }
        self.flushes.fetch_add(1, Ordering::Relaxed);

        let results = self.store.insert_many(&batch);
        if results.len() != batch.len() {
            error!(
                "Store returned {} results for a batch of {}",
                results.len(),
                batch.len()
            );
        }

        let mut persisted = 0usize;
        let mut failed = 0usize;
        for (index, message) in batch.iter().enumerate() {
            match results.get(index) {
                Some(Ok(Some(_))) => persisted += 1,
                Some(Ok(None)) => {
                    failed += 1;
                    warn!(
                        sender_id = message.sender_id,
                        "Batch insert affected no rows, skipping message"
                    );
                }
                Some(Err(e)) => {
                    failed += 1;
                    error!(sender_id = message.sender_id, "Batch insert failed, skipping message: {}", e);
                }
                None => failed += 1,
            }
        }

        self.persisted.fetch_add(persisted as u64, Ordering::Relaxed);
        self.failed.fetch_add(failed as u64, Ordering::Relaxed);

        if failed > 0 {
            warn!("Flush persisted {} of {} messages", persisted, batch.len());
        } else {
            debug!("Flush persisted {} messages", persisted);
        }

        persisted
    }

    pub fn stats(&self) -> FlushStats {
        FlushStats {
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}
