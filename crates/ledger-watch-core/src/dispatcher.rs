//! Idempotent topic dispatch.
//!
//! The dispatcher drives one inbound event through its topic handler:
//! duplicate short-circuit, mirrored-resource mutation, webhook history
//! append, journey advancement, and the failure bookkeeping that feeds the
//! queue processor. Handler errors become state transitions on the event
//! record; they never propagate out of `dispatch`.

use crate::{
    event_store::{EventStore, EventStoreError, InboundEvent, ProcessingState},
    journey::JourneyEngine,
    mirror::{MirrorStore, MirrorStoreError, TransferStatus, WebhookHistoryEntry},
    topic::EventTopic,
    ProviderEventId, ResourceId,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

// ============================================================================
// Core Types
// ============================================================================

/// How an event left the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran and the event is completed
    Completed,
    /// Event was already completed; nothing re-applied
    Duplicate,
    /// Topic is not routed; acknowledged as a no-op and completed
    Ignored,
    /// Handler failed; event is eligible for retry
    Failed { error: String },
    /// Handler failed at the retry ceiling; manual review required
    Quarantined { error: String },
}

impl DispatchOutcome {
    /// Get string representation (metrics/logging label)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Failed { .. } => "failed",
            Self::Quarantined { .. } => "quarantined",
        }
    }
}

/// Errors from the dispatch machinery itself. Topic handler failures are
/// recorded on the event record instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event not found: {id}")]
    NotFound { id: ProviderEventId },

    #[error("Event store error: {0}")]
    Store(#[from] EventStoreError),
}

/// Error raised inside a topic handler; converted to event-record state.
#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error("Event has no resource id")]
    MissingResourceId,

    #[error("Mirror store error: {0}")]
    Mirror(#[from] MirrorStoreError),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes verified events to topic handlers with an idempotency guard.
pub struct EventDispatcher {
    event_store: Arc<dyn EventStore>,
    mirror: Arc<dyn MirrorStore>,
    journeys: Arc<JourneyEngine>,
    max_attempts: u32,
}

impl EventDispatcher {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        mirror: Arc<dyn MirrorStore>,
        journeys: Arc<JourneyEngine>,
        max_attempts: u32,
    ) -> Self {
        Self {
            event_store,
            mirror,
            journeys,
            max_attempts,
        }
    }

    /// Process one stored event by id.
    ///
    /// Safe to call any number of times for the same event: a `completed`
    /// record short-circuits before any side effect re-runs.
    #[instrument(skip(self), fields(event_id = %id))]
    pub async fn dispatch(&self, id: &ProviderEventId) -> Result<DispatchOutcome, DispatchError> {
        let event = self
            .event_store
            .get(id)
            .await?
            .ok_or_else(|| DispatchError::NotFound { id: id.clone() })?;

        // Idempotency guard: re-delivery of a processed event is a no-op
        if event.state == ProcessingState::Completed {
            info!(topic = %event.topic, "Duplicate delivery short-circuited");
            return Ok(DispatchOutcome::Duplicate);
        }
        if event.state == ProcessingState::Quarantined {
            warn!(topic = %event.topic, "Quarantined event not re-dispatched");
            return Ok(DispatchOutcome::Quarantined {
                error: event.last_error.unwrap_or_default(),
            });
        }

        let event = self.event_store.mark_processing(id).await?;
        let started = Instant::now();

        if !event.topic.is_known() {
            info!(topic = %event.topic, "Unknown topic acknowledged as no-op");
            self.event_store
                .mark_completed(id, started.elapsed())
                .await?;
            return Ok(DispatchOutcome::Ignored);
        }

        match self.handle(&event).await {
            Ok(()) => {
                self.event_store
                    .mark_completed(id, started.elapsed())
                    .await?;
                info!(topic = %event.topic, "Event processed");
                Ok(DispatchOutcome::Completed)
            }
            Err(handler_error) => {
                let message = handler_error.to_string();
                let updated = self
                    .event_store
                    .mark_failed(id, &message, self.max_attempts)
                    .await?;

                if updated.state == ProcessingState::Quarantined {
                    warn!(
                        topic = %event.topic,
                        attempts = updated.attempts,
                        error = %message,
                        "Event quarantined after exhausting retries"
                    );
                    Ok(DispatchOutcome::Quarantined { error: message })
                } else {
                    warn!(
                        topic = %event.topic,
                        attempts = updated.attempts,
                        error = %message,
                        "Event processing failed; will retry"
                    );
                    Ok(DispatchOutcome::Failed { error: message })
                }
            }
        }
    }

    /// Topic handler body. Exhaustive over [`EventTopic`]; the `Unknown`
    /// variant never reaches here.
    async fn handle(&self, event: &InboundEvent) -> Result<(), HandlerError> {
        let resource_id = event
            .resource_id
            .as_ref()
            .ok_or(HandlerError::MissingResourceId)?;

        match &event.topic {
            EventTopic::TransferCreated => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Created)
                    .await?;
            }
            EventTopic::TransferPending => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Pending)
                    .await?;
            }
            EventTopic::TransferCompleted => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Completed)
                    .await?;
            }
            EventTopic::TransferFailed => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Failed)
                    .await?;
            }
            EventTopic::TransferCancelled => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Cancelled)
                    .await?;
            }
            EventTopic::TransferReturned => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Returned)
                    .await?;
            }
            EventTopic::TransferReclaimed => {
                self.apply_transfer_status(event, resource_id, TransferStatus::Reclaimed)
                    .await?;
            }

            // Customer and micro-deposit topics have no mirrored record to
            // mutate; they only advance journeys.
            EventTopic::CustomerCreated
            | EventTopic::CustomerVerificationDocumentNeeded
            | EventTopic::CustomerVerificationDocumentUploaded
            | EventTopic::CustomerVerified
            | EventTopic::CustomerSuspended
            | EventTopic::MicrodepositsAdded
            | EventTopic::MicrodepositsCompleted
            | EventTopic::MicrodepositsFailed => {}

            EventTopic::Unknown(_) => unreachable!("unknown topics short-circuit in dispatch"),
        }

        if let Some(resource_type) = event.topic.resource_type() {
            self.journeys.on_event(
                resource_type,
                resource_id,
                &event.topic,
                event.received_at,
                &event.id,
            );
        }

        Ok(())
    }

    /// Mutate the mirrored transfer and append the event envelope to its
    /// webhook history.
    async fn apply_transfer_status(
        &self,
        event: &InboundEvent,
        resource_id: &ResourceId,
        status: TransferStatus,
    ) -> Result<(), HandlerError> {
        let return_code = event
            .payload
            .get("returnCode")
            .and_then(|c| c.as_str())
            .map(str::to_owned);

        let transfer = self
            .mirror
            .apply_status(resource_id, status, return_code.as_deref())
            .await?;

        self.mirror
            .append_webhook_history(
                resource_id,
                WebhookHistoryEntry {
                    event_id: event.id.clone(),
                    topic: event.topic.clone(),
                    received_at: event.received_at,
                    payload: event.payload.clone(),
                },
            )
            .await?;

        info!(
            transfer_id = %resource_id,
            status = transfer.status.as_str(),
            return_code = transfer.return_code.as_deref().unwrap_or("-"),
            "Mirrored transfer updated"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
