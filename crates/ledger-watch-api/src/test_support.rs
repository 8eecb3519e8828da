//! Shared fixtures for handler tests.

use crate::{metrics::ServiceMetrics, AppState, ServiceConfig};
use ledger_watch_core::{
    sign_payload, ControlToken, EventDispatcher, InMemoryEventStore, InMemoryMirrorStore,
    InMemoryReconciliationStore, JourneyEngine, QueueProcessor, ReconciliationEngine,
    StaticProviderClient, WebhookSecret,
};
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-webhook-secret";

/// Everything a handler test needs: the state plus direct handles to the
/// in-memory backends behind it.
pub struct TestHarness {
    pub state: AppState,
    pub event_store: Arc<InMemoryEventStore>,
    pub mirror: Arc<InMemoryMirrorStore>,
    pub provider: Arc<StaticProviderClient>,
    pub reconciliation_store: Arc<InMemoryReconciliationStore>,
}

pub fn harness() -> TestHarness {
    let config = ServiceConfig::default();
    let secret = WebhookSecret::new(TEST_SECRET);

    let event_store = Arc::new(InMemoryEventStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new());
    let provider = Arc::new(StaticProviderClient::new());
    let reconciliation_store = Arc::new(InMemoryReconciliationStore::new());
    let journeys = Arc::new(JourneyEngine::with_seed_definitions());

    let dispatcher = Arc::new(EventDispatcher::new(
        event_store.clone(),
        mirror.clone(),
        journeys.clone(),
        config.queue.max_attempts,
    ));
    let queue_processor = Arc::new(QueueProcessor::new(
        event_store.clone(),
        dispatcher.clone(),
        config.queue.to_processor_config(),
    ));
    let reconciliation = Arc::new(ReconciliationEngine::new(
        mirror.clone(),
        provider.clone(),
        reconciliation_store.clone(),
        config.reconciliation.to_engine_config(),
    ));

    let state = AppState {
        config,
        webhook_secret: secret,
        event_store: event_store.clone(),
        mirror: mirror.clone(),
        journeys,
        dispatcher,
        queue_processor,
        reconciliation,
        reconciliation_token: ControlToken::new(),
        metrics: ServiceMetrics::new().expect("metrics registry"),
    };

    TestHarness {
        state,
        event_store,
        mirror,
        provider,
        reconciliation_store,
    }
}

/// Hex signature for a webhook body under the test secret.
pub fn signature_for(body: &[u8]) -> String {
    sign_payload(body, &WebhookSecret::new(TEST_SECRET))
}
