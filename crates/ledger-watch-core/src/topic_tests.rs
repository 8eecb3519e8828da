//! Tests for typed event topics.

use super::*;

#[test]
fn test_known_topic_round_trip() {
    let topic = EventTopic::parse("transfer_returned");
    assert_eq!(topic, EventTopic::TransferReturned);
    assert_eq!(topic.as_str(), "transfer_returned");
    assert!(topic.is_known());
}

#[test]
fn test_unknown_topic_is_preserved_verbatim() {
    let topic = EventTopic::parse("account_activity_digest");
    assert_eq!(
        topic,
        EventTopic::Unknown("account_activity_digest".to_string())
    );
    assert_eq!(topic.as_str(), "account_activity_digest");
    assert!(!topic.is_known());
    assert_eq!(topic.resource_type(), None);
}

#[test]
fn test_topic_resource_types() {
    assert_eq!(
        EventTopic::TransferCompleted.resource_type(),
        Some(ResourceType::Transfer)
    );
    assert_eq!(
        EventTopic::CustomerVerified.resource_type(),
        Some(ResourceType::Customer)
    );
    assert_eq!(
        EventTopic::MicrodepositsAdded.resource_type(),
        Some(ResourceType::Customer)
    );
}

#[test]
fn test_topic_serde_uses_wire_strings() {
    let json = serde_json::to_string(&EventTopic::TransferFailed).unwrap();
    assert_eq!(json, "\"transfer_failed\"");

    let parsed: EventTopic = serde_json::from_str("\"customer_created\"").unwrap();
    assert_eq!(parsed, EventTopic::CustomerCreated);

    let unknown: EventTopic = serde_json::from_str("\"brand_new_topic\"").unwrap();
    assert_eq!(unknown, EventTopic::Unknown("brand_new_topic".to_string()));
}
