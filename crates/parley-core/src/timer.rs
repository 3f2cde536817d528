use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::flush::FlushCoordinator;

/// Background task that flushes the batch queue on a fixed period.
///
/// Started at service initialization, stopped at shutdown. Stopping runs
/// one last flush so messages queued since the previous tick are kept.
pub struct FlushTimer {
    coordinator: Arc<FlushCoordinator>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FlushTimer {
    /// Spawn the timer on the current tokio runtime.
    pub fn start(coordinator: Arc<FlushCoordinator>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_flush_loop(coordinator.clone(), period, cancel.clone()));

        info!("Flush timer started (every {} ms)", period.as_millis());
        Self {
            coordinator,
            cancel,
            handle,
        }
    }

    /// Cancel the timer, wait for an in-flight tick, then flush whatever is
    /// left. Returns the number of messages the final flush persisted.
    pub async fn stop(self) -> usize {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Flush timer task join error: {}", e);
        }

        let coordinator = self.coordinator;
        let flushed = match tokio::task::spawn_blocking(move || coordinator.flush()).await {
            Ok(n) => n,
            Err(e) => {
                error!("Final flush join error: {}", e);
                0
            }
        };

        info!("Flush timer stopped, final flush persisted {} messages", flushed);
        flushed
    }
}

async fn run_flush_loop(
    coordinator: Arc<FlushCoordinator>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if coordinator.queue().is_empty() {
                    continue;
                }

                // Store writes are blocking; keep them off the async workers.
                let coord = coordinator.clone();
                match tokio::task::spawn_blocking(move || coord.flush()).await {
                    Ok(n) if n > 0 => debug!("Timer flush persisted {} messages", n),
                    Ok(_) => {}
                    Err(e) => error!("Timer flush join error: {}", e),
                }
            }
        }
    }
}
