//! Tests for the mirrored transfer store and return-code reference.

use super::*;
use crate::topic::EventTopic;
use serde_json::json;
use std::time::Duration;

fn transfer_id(s: &str) -> ResourceId {
    ResourceId::new(s).unwrap()
}

#[test]
fn test_ach_return_reason_lookup() {
    assert_eq!(ach_return_reason("R01"), "Insufficient funds");
    assert_eq!(ach_return_reason("R02"), "Bank account closed");
    // Unlisted codes still produce something operator-readable
    assert_eq!(ach_return_reason("R86"), "ACH return (R86)");
}

#[tokio::test]
async fn test_apply_completed_sets_processed_at() {
    let store = InMemoryMirrorStore::new();
    let id = transfer_id("t-1");
    store
        .upsert_transfer(MirroredTransfer::new(id.clone(), "25.00", "USD"))
        .await
        .unwrap();

    let updated = store
        .apply_status(&id, TransferStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(updated.status, TransferStatus::Completed);
    assert!(updated.processed_at.is_some());
}

#[tokio::test]
async fn test_apply_returned_resolves_failure_reason() {
    let store = InMemoryMirrorStore::new();
    let id = transfer_id("t-2");
    store
        .upsert_transfer(MirroredTransfer::new(id.clone(), "25.00", "USD"))
        .await
        .unwrap();

    let updated = store
        .apply_status(&id, TransferStatus::Returned, Some("R01"))
        .await
        .unwrap();
    assert_eq!(updated.status, TransferStatus::Returned);
    assert_eq!(updated.return_code.as_deref(), Some("R01"));
    assert_eq!(updated.failure_reason.as_deref(), Some("Insufficient funds"));
}

#[tokio::test]
async fn test_apply_status_creates_placeholder_for_unseen_transfer() {
    let store = InMemoryMirrorStore::new();
    let id = transfer_id("t-3");

    let updated = store
        .apply_status(&id, TransferStatus::Pending, None)
        .await
        .unwrap();
    assert_eq!(updated.status, TransferStatus::Pending);
    assert_eq!(store.get_transfer(&id).await.unwrap().unwrap().id, id);
}

#[tokio::test]
async fn test_webhook_history_is_append_only() {
    let store = InMemoryMirrorStore::new();
    let id = transfer_id("t-4");

    for n in 0..3 {
        store
            .append_webhook_history(
                &id,
                WebhookHistoryEntry {
                    event_id: ProviderEventId::new(format!("evt-{}", n)).unwrap(),
                    topic: EventTopic::TransferPending,
                    received_at: Timestamp::now(),
                    payload: json!({"n": n}),
                },
            )
            .await
            .unwrap();
    }

    let transfer = store.get_transfer(&id).await.unwrap().unwrap();
    assert_eq!(transfer.webhook_history.len(), 3);
    assert_eq!(transfer.webhook_history[0].event_id.as_str(), "evt-0");
    assert_eq!(transfer.webhook_history[2].event_id.as_str(), "evt-2");
}

#[tokio::test]
async fn test_list_transfers_in_window() {
    let store = InMemoryMirrorStore::new();

    let mut old = MirroredTransfer::new(transfer_id("t-old"), "1.00", "USD");
    old.created_at = Timestamp::now().minus(Duration::from_secs(72 * 3600));
    store.upsert_transfer(old).await.unwrap();

    let recent = MirroredTransfer::new(transfer_id("t-new"), "2.00", "USD");
    store.upsert_transfer(recent).await.unwrap();

    let start = Timestamp::now().minus(Duration::from_secs(24 * 3600));
    let end = Timestamp::now();
    let in_window = store.list_transfers_in_window(start, end).await.unwrap();

    assert_eq!(in_window.len(), 1);
    assert_eq!(in_window[0].id.as_str(), "t-new");
}
