//! Tests for idempotent topic dispatch.

use super::*;
use crate::event_store::InMemoryEventStore;
use crate::journey::{JourneyEngine, JourneyStatus};
use crate::mirror::InMemoryMirrorStore;
use serde_json::json;

struct Fixture {
    event_store: Arc<InMemoryEventStore>,
    mirror: Arc<InMemoryMirrorStore>,
    journeys: Arc<JourneyEngine>,
    dispatcher: EventDispatcher,
}

fn fixture(max_attempts: u32) -> Fixture {
    let event_store = Arc::new(InMemoryEventStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new());
    let journeys = Arc::new(JourneyEngine::with_seed_definitions());
    let dispatcher = EventDispatcher::new(
        event_store.clone(),
        mirror.clone(),
        journeys.clone(),
        max_attempts,
    );
    Fixture {
        event_store,
        mirror,
        journeys,
        dispatcher,
    }
}

async fn insert_event(
    fixture: &Fixture,
    id: &str,
    topic: &str,
    resource: Option<&str>,
    payload: serde_json::Value,
) -> ProviderEventId {
    let event_id = ProviderEventId::new(id).unwrap();
    let event = InboundEvent::received(
        event_id.clone(),
        EventTopic::parse(topic),
        resource.map(|r| ResourceId::new(r).unwrap()),
        payload,
    );
    fixture.event_store.insert_new(event).await.unwrap();
    event_id
}

#[tokio::test]
async fn test_transfer_returned_end_to_end() {
    let fx = fixture(5);
    let id = insert_event(
        &fx,
        "evt-r01",
        "transfer_returned",
        Some("T1"),
        json!({"id": "evt-r01", "topic": "transfer_returned", "returnCode": "R01"}),
    )
    .await;

    let outcome = fx.dispatcher.dispatch(&id).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Completed);

    let transfer = fx
        .mirror
        .get_transfer(&ResourceId::new("T1").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Returned);
    assert_eq!(transfer.return_code.as_deref(), Some("R01"));
    assert_eq!(transfer.failure_reason.as_deref(), Some("Insufficient funds"));
    assert_eq!(transfer.webhook_history.len(), 1);
    assert_eq!(transfer.webhook_history[0].topic, EventTopic::TransferReturned);
}

#[tokio::test]
async fn test_dispatch_twice_is_idempotent() {
    let fx = fixture(5);
    let id = insert_event(
        &fx,
        "evt-idem",
        "transfer_completed",
        Some("T2"),
        json!({"id": "evt-idem", "topic": "transfer_completed"}),
    )
    .await;

    assert_eq!(fx.dispatcher.dispatch(&id).await.unwrap(), DispatchOutcome::Completed);
    assert_eq!(fx.dispatcher.dispatch(&id).await.unwrap(), DispatchOutcome::Duplicate);

    // Second dispatch re-applied no side effects
    let transfer = fx
        .mirror
        .get_transfer(&ResourceId::new("T2").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transfer.webhook_history.len(), 1);

    let stored = fx.event_store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.state, ProcessingState::Completed);
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn test_unknown_topic_is_acknowledged_as_noop() {
    let fx = fixture(5);
    let id = insert_event(
        &fx,
        "evt-unknown",
        "account_activity_digest",
        Some("T3"),
        json!({"id": "evt-unknown"}),
    )
    .await;

    assert_eq!(fx.dispatcher.dispatch(&id).await.unwrap(), DispatchOutcome::Ignored);

    // The record is closed, and no mirror record appeared
    let stored = fx.event_store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.state, ProcessingState::Completed);
    assert!(fx
        .mirror
        .get_transfer(&ResourceId::new("T3").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_handler_failure_records_error_and_retries() {
    let fx = fixture(3);
    // A known transfer topic with no resource linkage fails its handler
    let id = insert_event(
        &fx,
        "evt-fail",
        "transfer_completed",
        None,
        json!({"id": "evt-fail"}),
    )
    .await;

    let outcome = fx.dispatcher.dispatch(&id).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));

    let stored = fx.event_store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.state, ProcessingState::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.last_error.is_some());
}

#[tokio::test]
async fn test_retry_ceiling_quarantines() {
    let fx = fixture(2);
    let id = insert_event(
        &fx,
        "evt-quarantine",
        "transfer_completed",
        None,
        json!({"id": "evt-quarantine"}),
    )
    .await;

    assert!(matches!(
        fx.dispatcher.dispatch(&id).await.unwrap(),
        DispatchOutcome::Failed { .. }
    ));
    assert!(matches!(
        fx.dispatcher.dispatch(&id).await.unwrap(),
        DispatchOutcome::Quarantined { .. }
    ));

    // Further dispatches never re-run the handler
    assert!(matches!(
        fx.dispatcher.dispatch(&id).await.unwrap(),
        DispatchOutcome::Quarantined { .. }
    ));
    let stored = fx.event_store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.state, ProcessingState::Quarantined);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn test_dispatch_advances_matching_journey() {
    let fx = fixture(5);
    let id = insert_event(
        &fx,
        "evt-journey",
        "transfer_created",
        Some("T4"),
        json!({"id": "evt-journey", "topic": "transfer_created"}),
    )
    .await;

    fx.dispatcher.dispatch(&id).await.unwrap();

    let instance = fx
        .journeys
        .get_instance("Transfer Lifecycle", &ResourceId::new("T4").unwrap())
        .unwrap();
    assert_eq!(instance.completed_steps.len(), 1);
    assert_eq!(instance.status, JourneyStatus::Active);
}

#[tokio::test]
async fn test_missing_event_is_a_dispatch_error() {
    let fx = fixture(5);
    let err = fx
        .dispatcher
        .dispatch(&ProviderEventId::new("evt-missing").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound { .. }));
}
