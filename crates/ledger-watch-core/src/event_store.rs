//! Durable table of raw inbound events.
//!
//! Every verified webhook delivery is recorded here before any side effect
//! runs, keyed by the provider's event id. The record tracks the event's
//! passage through processing states and its retry metadata. Records are
//! never deleted; a terminal failure is quarantined for manual review.
//!
//! The insert is atomic insert-if-absent: a re-delivery of an id already in
//! the table is rejected with the existing record, which is how duplicate
//! deliveries are short-circuited under concurrent intake.

use crate::{topic::EventTopic, ProviderEventId, ResourceId, ResourceType, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

// ============================================================================
// Core Types
// ============================================================================

/// Processing state of an inbound event.
///
/// `received → queued → processing → completed | failed → quarantined`
///
/// `failed` events are eligible for retry; `quarantined` events exceeded
/// the retry ceiling and require manual intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Received,
    Queued,
    Processing,
    Completed,
    Failed,
    Quarantined,
}

impl ProcessingState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Quarantined => "quarantined",
        }
    }

    /// True for states the queue processor picks up
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Queued | Self::Failed)
    }

    /// True for states that will never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Quarantined)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw inbound webhook event and its processing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Provider-assigned event id; globally unique, the idempotency key
    pub id: ProviderEventId,

    /// Event topic as delivered
    pub topic: EventTopic,

    /// Kind of resource the event refers to
    pub resource_type: Option<ResourceType>,

    /// Id of the affected resource
    pub resource_id: Option<ResourceId>,

    /// When this service received the delivery
    pub received_at: Timestamp,

    /// Raw payload as delivered (opaque to the store)
    pub payload: serde_json::Value,

    /// Current processing state
    pub state: ProcessingState,

    /// Number of processing attempts so far
    pub attempts: u32,

    /// Error message from the most recent failed attempt
    pub last_error: Option<String>,

    /// Wall-clock duration of the successful processing attempt
    pub processing_duration: Option<Duration>,
}

impl InboundEvent {
    /// Build a freshly received event record.
    pub fn received(
        id: ProviderEventId,
        topic: EventTopic,
        resource_id: Option<ResourceId>,
        payload: serde_json::Value,
    ) -> Self {
        let resource_type = topic.resource_type();
        Self {
            id,
            topic,
            resource_type,
            resource_id,
            received_at: Timestamp::now(),
            payload,
            state: ProcessingState::Received,
            attempts: 0,
            last_error: None,
            processing_duration: None,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from event store operations
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// The provider event id is already present; carries the stored record
    /// so callers can short-circuit without a second read.
    #[error("Duplicate event id: {}", existing.id)]
    Duplicate { existing: Box<InboundEvent> },

    #[error("Event not found: {id}")]
    NotFound { id: ProviderEventId },

    #[error("Invalid state transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: ProviderEventId,
        from: ProcessingState,
        to: ProcessingState,
    },

    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },
}

impl EventStoreError {
    /// Check if the error is transient and the operation worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }
}

// ============================================================================
// Store Interface
// ============================================================================

/// Interface for the durable inbound-event table.
///
/// Implementations must make `insert_new` an atomic insert-if-absent on the
/// provider event id. This is the primary correctness-critical concurrency
/// point of the intake path.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event record; rejects duplicates atomically.
    async fn insert_new(&self, event: InboundEvent) -> Result<InboundEvent, EventStoreError>;

    /// Fetch an event by provider event id.
    async fn get(&self, id: &ProviderEventId) -> Result<Option<InboundEvent>, EventStoreError>;

    /// Move a `received` event to `queued`.
    async fn mark_queued(&self, id: &ProviderEventId) -> Result<InboundEvent, EventStoreError>;

    /// Move a retryable event to `processing` and bump its attempt count.
    async fn mark_processing(&self, id: &ProviderEventId)
        -> Result<InboundEvent, EventStoreError>;

    /// Close an event as `completed`, recording the processing duration.
    async fn mark_completed(
        &self,
        id: &ProviderEventId,
        duration: Duration,
    ) -> Result<InboundEvent, EventStoreError>;

    /// Record a failed attempt. Transitions to `failed`, or `quarantined`
    /// once the attempt count has reached `max_attempts`.
    async fn mark_failed(
        &self,
        id: &ProviderEventId,
        error: &str,
        max_attempts: u32,
    ) -> Result<InboundEvent, EventStoreError>;

    /// Select up to `limit` events in a retryable state with fewer than
    /// `max_attempts` attempts, oldest first.
    async fn list_retryable(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<InboundEvent>, EventStoreError>;

    /// Count events per processing state (operational visibility).
    async fn state_counts(&self) -> Result<HashMap<ProcessingState, usize>, EventStoreError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Thread-safe in-memory event store.
///
/// Intended for testing, development, and single-process deployments; the
/// trait boundary keeps a relational implementation a drop-in replacement.
pub struct InMemoryEventStore {
    inner: RwLock<EventTable>,
}

struct EventTable {
    /// Records keyed by provider event id
    events: HashMap<ProviderEventId, InboundEvent>,
    /// Arrival order, for oldest-first retry selection
    order: Vec<ProviderEventId>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(EventTable {
                events: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    fn write_locked<T>(
        &self,
        f: impl FnOnce(&mut EventTable) -> Result<T, EventStoreError>,
    ) -> Result<T, EventStoreError> {
        let mut table = self.inner.write().map_err(|_| EventStoreError::OperationFailed {
            message: "event table lock poisoned".to_string(),
        })?;
        f(&mut table)
    }

    fn update_state<'a>(
        table: &'a mut EventTable,
        id: &ProviderEventId,
        allowed_from: &[ProcessingState],
        to: ProcessingState,
    ) -> Result<&'a mut InboundEvent, EventStoreError> {
        let event = table
            .events
            .get_mut(id)
            .ok_or_else(|| EventStoreError::NotFound { id: id.clone() })?;

        if !allowed_from.contains(&event.state) {
            return Err(EventStoreError::InvalidTransition {
                id: id.clone(),
                from: event.state,
                to,
            });
        }

        event.state = to;
        Ok(event)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_new(&self, event: InboundEvent) -> Result<InboundEvent, EventStoreError> {
        self.write_locked(|table| {
            if let Some(existing) = table.events.get(&event.id) {
                return Err(EventStoreError::Duplicate {
                    existing: Box::new(existing.clone()),
                });
            }
            table.order.push(event.id.clone());
            table.events.insert(event.id.clone(), event.clone());
            Ok(event)
        })
    }

    async fn get(&self, id: &ProviderEventId) -> Result<Option<InboundEvent>, EventStoreError> {
        let table = self.inner.read().map_err(|_| EventStoreError::OperationFailed {
            message: "event table lock poisoned".to_string(),
        })?;
        Ok(table.events.get(id).cloned())
    }

    async fn mark_queued(&self, id: &ProviderEventId) -> Result<InboundEvent, EventStoreError> {
        self.write_locked(|table| {
            let event =
                Self::update_state(table, id, &[ProcessingState::Received], ProcessingState::Queued)?;
            Ok(event.clone())
        })
    }

    async fn mark_processing(
        &self,
        id: &ProviderEventId,
    ) -> Result<InboundEvent, EventStoreError> {
        self.write_locked(|table| {
            let event = Self::update_state(
                table,
                id,
                &[
                    ProcessingState::Received,
                    ProcessingState::Queued,
                    ProcessingState::Failed,
                ],
                ProcessingState::Processing,
            )?;
            event.attempts += 1;
            Ok(event.clone())
        })
    }

    async fn mark_completed(
        &self,
        id: &ProviderEventId,
        duration: Duration,
    ) -> Result<InboundEvent, EventStoreError> {
        self.write_locked(|table| {
            let event = Self::update_state(
                table,
                id,
                &[ProcessingState::Processing],
                ProcessingState::Completed,
            )?;
            event.processing_duration = Some(duration);
            event.last_error = None;
            Ok(event.clone())
        })
    }

    async fn mark_failed(
        &self,
        id: &ProviderEventId,
        error: &str,
        max_attempts: u32,
    ) -> Result<InboundEvent, EventStoreError> {
        self.write_locked(|table| {
            let event = table
                .events
                .get_mut(id)
                .ok_or_else(|| EventStoreError::NotFound { id: id.clone() })?;

            if event.state.is_terminal() {
                return Err(EventStoreError::InvalidTransition {
                    id: id.clone(),
                    from: event.state,
                    to: ProcessingState::Failed,
                });
            }

            event.last_error = Some(error.to_string());
            event.state = if event.attempts >= max_attempts {
                ProcessingState::Quarantined
            } else {
                ProcessingState::Failed
            };
            Ok(event.clone())
        })
    }

    async fn list_retryable(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<InboundEvent>, EventStoreError> {
        let table = self.inner.read().map_err(|_| EventStoreError::OperationFailed {
            message: "event table lock poisoned".to_string(),
        })?;

        let mut selected = Vec::new();
        for id in &table.order {
            if selected.len() >= limit {
                break;
            }
            if let Some(event) = table.events.get(id) {
                if event.state.is_retryable() && event.attempts < max_attempts {
                    selected.push(event.clone());
                }
            }
        }
        Ok(selected)
    }

    async fn state_counts(&self) -> Result<HashMap<ProcessingState, usize>, EventStoreError> {
        let table = self.inner.read().map_err(|_| EventStoreError::OperationFailed {
            message: "event table lock poisoned".to_string(),
        })?;

        let mut counts = HashMap::new();
        for event in table.events.values() {
            *counts.entry(event.state).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
#[path = "event_store_tests.rs"]
mod tests;
