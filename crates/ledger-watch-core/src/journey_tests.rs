//! Tests for the journey state machine engine.

use super::*;

fn customer(id: &str) -> ResourceId {
    ResourceId::new(id).unwrap()
}

fn event_id(n: u32) -> ProviderEventId {
    ProviderEventId::new(format!("evt-{}", n)).unwrap()
}

fn advance(
    engine: &JourneyEngine,
    resource: &ResourceId,
    topic: EventTopic,
    at: Timestamp,
    n: u32,
) -> Vec<JourneyInstance> {
    engine.on_event(
        topic.resource_type().unwrap(),
        resource,
        &topic,
        at,
        &event_id(n),
    )
}

#[test]
fn test_two_of_four_steps_is_fifty_percent_active() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C1");
    let now = Timestamp::now();

    advance(&engine, &c1, EventTopic::CustomerCreated, now, 1);
    let updated = advance(
        &engine,
        &c1,
        EventTopic::CustomerVerificationDocumentNeeded,
        now,
        2,
    );

    let instance = updated
        .iter()
        .find(|i| i.definition == "Customer Verification")
        .unwrap();
    assert_eq!(instance.progress_percentage, 50.0);
    assert_eq!(instance.status, JourneyStatus::Active);
    assert_eq!(instance.completed_steps.len(), 2);
}

#[test]
fn test_duplicate_step_does_not_double_count_progress() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C2");
    let now = Timestamp::now();

    advance(&engine, &c1, EventTopic::CustomerCreated, now, 1);
    advance(&engine, &c1, EventTopic::CustomerCreated, now, 2);

    let instance = engine.get_instance("Customer Verification", &c1).unwrap();
    assert_eq!(instance.completed_steps.len(), 1);
    assert_eq!(instance.progress_percentage, 25.0);
    // The audit trail still records both deliveries
    assert_eq!(instance.steps.len(), 2);
}

#[test]
fn test_terminal_step_completes_journey() {
    let engine = JourneyEngine::with_seed_definitions();
    let t1 = ResourceId::new("T1").unwrap();
    let now = Timestamp::now();

    advance(&engine, &t1, EventTopic::TransferCreated, now, 1);
    advance(&engine, &t1, EventTopic::TransferPending, now, 2);
    advance(&engine, &t1, EventTopic::TransferCompleted, now, 3);

    let instance = engine.get_instance("Transfer Lifecycle", &t1).unwrap();
    assert_eq!(instance.status, JourneyStatus::Completed);
    assert_eq!(instance.progress_percentage, 100.0);
    assert!(instance.ended_at.is_some());
    assert!(instance.total_duration.is_some());
}

#[test]
fn test_failure_step_fails_journey() {
    let engine = JourneyEngine::with_seed_definitions();
    let t1 = ResourceId::new("T2").unwrap();
    let now = Timestamp::now();

    advance(&engine, &t1, EventTopic::TransferCreated, now, 1);
    advance(&engine, &t1, EventTopic::TransferReturned, now, 2);

    let instance = engine.get_instance("Transfer Lifecycle", &t1).unwrap();
    assert_eq!(instance.status, JourneyStatus::Failed);
    assert!(instance.risk_score >= 80);
}

#[test]
fn test_terminal_states_never_reopen() {
    let engine = JourneyEngine::with_seed_definitions();
    let t1 = ResourceId::new("T3").unwrap();
    let now = Timestamp::now();

    advance(&engine, &t1, EventTopic::TransferCreated, now, 1);
    advance(&engine, &t1, EventTopic::TransferFailed, now, 2);

    let before = engine.get_instance("Transfer Lifecycle", &t1).unwrap();
    assert_eq!(before.status, JourneyStatus::Failed);

    // A late event for a failed journey is ignored
    let updated = advance(&engine, &t1, EventTopic::TransferPending, now, 3);
    assert!(updated.is_empty());

    let after = engine.get_instance("Transfer Lifecycle", &t1).unwrap();
    assert_eq!(after.status, JourneyStatus::Failed);
    assert_eq!(after.steps.len(), before.steps.len());
}

#[test]
fn test_step_history_is_monotonic() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C3");
    let now = Timestamp::now();

    let mut last_len = 0;
    for (n, topic) in [
        EventTopic::CustomerCreated,
        EventTopic::CustomerVerificationDocumentNeeded,
        EventTopic::CustomerVerificationDocumentUploaded,
        EventTopic::CustomerVerified,
    ]
    .into_iter()
    .enumerate()
    {
        advance(&engine, &c1, topic, now, n as u32);
        let instance = engine.get_instance("Customer Verification", &c1).unwrap();
        assert!(instance.completed_steps.len() > last_len);
        last_len = instance.completed_steps.len();
    }

    let instance = engine.get_instance("Customer Verification", &c1).unwrap();
    assert_eq!(instance.status, JourneyStatus::Completed);
}

#[test]
fn test_sweep_marks_stale_instances_stuck() {
    let engine = JourneyEngine::with_seed_definitions();
    let stale = customer("C-stale");
    let fresh = customer("C-fresh");

    let three_hours_ago = Timestamp::now().minus(Duration::from_secs(3 * 3600));
    let one_hour_ago = Timestamp::now().minus(Duration::from_secs(3600));

    advance(&engine, &stale, EventTopic::CustomerCreated, three_hours_ago, 1);
    advance(&engine, &fresh, EventTopic::CustomerCreated, one_hour_ago, 2);

    let outcome = engine.sweep_stuck(
        Duration::from_secs(2 * 3600),
        Duration::from_secs(48 * 3600),
    );
    assert_eq!(outcome.marked_stuck, 1);
    assert_eq!(outcome.marked_abandoned, 0);

    assert_eq!(
        engine.get_instance("Customer Verification", &stale).unwrap().status,
        JourneyStatus::Stuck
    );
    assert_eq!(
        engine.get_instance("Customer Verification", &fresh).unwrap().status,
        JourneyStatus::Active
    );
}

#[test]
fn test_fresh_event_revives_stuck_journey() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C-revive");
    let three_hours_ago = Timestamp::now().minus(Duration::from_secs(3 * 3600));

    advance(&engine, &c1, EventTopic::CustomerCreated, three_hours_ago, 1);
    engine.sweep_stuck(
        Duration::from_secs(2 * 3600),
        Duration::from_secs(48 * 3600),
    );
    assert_eq!(
        engine.get_instance("Customer Verification", &c1).unwrap().status,
        JourneyStatus::Stuck
    );

    advance(
        &engine,
        &c1,
        EventTopic::CustomerVerificationDocumentNeeded,
        Timestamp::now(),
        2,
    );
    assert_eq!(
        engine.get_instance("Customer Verification", &c1).unwrap().status,
        JourneyStatus::Active
    );
}

#[test]
fn test_sweep_abandons_long_idle_instances() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C-gone");
    let week_ago = Timestamp::now().minus(Duration::from_secs(7 * 24 * 3600));

    advance(&engine, &c1, EventTopic::CustomerCreated, week_ago, 1);
    let outcome = engine.sweep_stuck(
        Duration::from_secs(2 * 3600),
        Duration::from_secs(72 * 3600),
    );
    assert_eq!(outcome.marked_abandoned, 1);

    let instance = engine.get_instance("Customer Verification", &c1).unwrap();
    assert_eq!(instance.status, JourneyStatus::Abandoned);
    assert!(instance.ended_at.is_some());

    // Abandoned is terminal: a later sweep does nothing more
    let second = engine.sweep_stuck(
        Duration::from_secs(2 * 3600),
        Duration::from_secs(72 * 3600),
    );
    assert_eq!(second.marked_abandoned, 0);
}

#[test]
fn test_unmatched_topic_is_ignored() {
    let engine = JourneyEngine::with_seed_definitions();
    let updated = engine.on_event(
        ResourceType::Customer,
        &customer("C-none"),
        &EventTopic::Unknown("account_activity_digest".to_string()),
        Timestamp::now(),
        &event_id(1),
    );
    assert!(updated.is_empty());
}

#[test]
fn test_recommend_action_keyword_mapping() {
    let engine = JourneyEngine::with_seed_definitions();
    let c1 = customer("C-rec");
    let now = Timestamp::now();

    advance(&engine, &c1, EventTopic::CustomerCreated, now, 1);
    let verification = engine.get_instance("Customer Verification", &c1).unwrap();
    assert!(JourneyEngine::recommend_action(&verification).contains("verification documents"));

    advance(&engine, &c1, EventTopic::MicrodepositsAdded, now, 2);
    let microdeposit = engine
        .get_instance("Micro-deposit Verification", &c1)
        .unwrap();
    assert!(JourneyEngine::recommend_action(&microdeposit).contains("micro-deposit"));
}
