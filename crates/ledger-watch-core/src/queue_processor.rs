//! Background retry loop over queued and failed events.
//!
//! Repeatedly selects retryable events below the retry ceiling, re-invokes
//! the dispatcher for each, and pauses between batches. One event's
//! failure never takes the loop down: the dispatcher converts handler
//! errors into event-record state, and dispatch-machinery errors are
//! logged per item.

use crate::{
    dispatcher::EventDispatcher,
    event_store::EventStore,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pacing and ceiling configuration for the queue processor.
///
/// The deployed pacing policy is a fixed inter-batch pause; exponential
/// backoff between busy passes is a [`RetryPolicy`] configuration change,
/// not a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueProcessorConfig {
    /// Events drained per pass
    pub batch_size: usize,

    /// Pause policy between busy passes
    pub pacing: RetryPolicy,

    /// Pause when a pass found nothing to do
    pub idle_delay: Duration,

    /// Retry ceiling; at this attempt count an event is quarantined
    pub max_attempts: u32,
}

impl Default for QueueProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            pacing: RetryPolicy::fixed(Duration::from_secs(5), 5),
            idle_delay: Duration::from_secs(15),
            max_attempts: 5,
        }
    }
}

/// Start/stop-able background drain of the event store.
///
/// `start()` while the loop is already running is a no-op: the active
/// flag is claimed with a compare-exchange, so two loops can never run
/// concurrently.
pub struct QueueProcessor {
    event_store: Arc<dyn EventStore>,
    dispatcher: Arc<EventDispatcher>,
    config: QueueProcessorConfig,
    active: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl QueueProcessor {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        dispatcher: Arc<EventDispatcher>,
        config: QueueProcessorConfig,
    ) -> Self {
        Self {
            event_store,
            dispatcher,
            config,
            active: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the drain loop. No-op when already active.
    pub fn start(self: &Arc<Self>) {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Queue processor already active; start is a no-op");
            return;
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let processor = Arc::clone(self);
        tokio::spawn(async move {
            info!("Queue processor started");
            processor.run_loop().await;
            processor.active.store(false, Ordering::SeqCst);
            info!("Queue processor stopped");
        });
    }

    /// Request the loop to stop at the next batch boundary.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// True while the drain loop is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn run_loop(&self) {
        let mut busy_passes: u32 = 0;
        while !self.stop_requested.load(Ordering::SeqCst) {
            let processed = self.drain_batch().await;

            let delay = if processed == 0 {
                busy_passes = 0;
                self.config.idle_delay
            } else {
                busy_passes = busy_passes.saturating_add(1);
                self.config.pacing.calculate_delay(busy_passes)
            };

            // Sleep in short slices so stop requests take effect promptly
            let mut remaining = delay;
            let slice = Duration::from_millis(100);
            while !remaining.is_zero() && !self.stop_requested.load(Ordering::SeqCst) {
                let step = remaining.min(slice);
                tokio::time::sleep(step).await;
                remaining = remaining.saturating_sub(step);
            }
        }
    }

    /// Drain one batch; returns the number of events dispatched.
    ///
    /// Also usable directly from tests and one-shot admin tooling.
    pub async fn drain_batch(&self) -> usize {
        let batch = match self
            .event_store
            .list_retryable(self.config.batch_size, self.config.max_attempts)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Queue processor could not read retryable events");
                return 0;
            }
        };

        let mut processed = 0;
        for event in batch {
            // Failures are per-item: record and continue with the rest
            match self.dispatcher.dispatch(&event.id).await {
                Ok(outcome) => {
                    debug!(event_id = %event.id, outcome = outcome.as_str(), "Retried event");
                }
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "Retry dispatch errored");
                }
            }
            processed += 1;
        }
        processed
    }
}

#[cfg(test)]
#[path = "queue_processor_tests.rs"]
mod tests;
