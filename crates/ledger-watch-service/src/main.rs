//! # Ledger-Watch Service
//!
//! Binary entry point for the ledger-watch HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes logging
//! - Constructs stores, engines, and the dispatcher once, wiring them into
//!   an explicit application state (no module-level singletons)
//! - Starts the queue processor, the journey sweep, and the scheduled
//!   reconciliation loop
//! - Starts the HTTP server from ledger-watch-api

mod http_provider;

use http_provider::HttpProviderClient;
use ledger_watch_api::{start_server, AppState, ServiceConfig};
use ledger_watch_api::metrics::ServiceMetrics;
use ledger_watch_core::{
    ControlToken, EventDispatcher, InMemoryEventStore, InMemoryMirrorStore,
    InMemoryReconciliationStore, JourneyEngine, ProviderClient, QueueProcessor,
    ReconciliationEngine, ResourceType, StaticProviderClient, Timestamp, WebhookSecret,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ledger_watch_service=info,ledger_watch_api=info,ledger_watch_core=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ledger-Watch Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/ledger-watch/service.toml   — system-wide defaults
    //  2. ./config/service.toml            — deployment-local override
    //  3. Path given by LW_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed LW__ (double-underscore separator)
    //     e.g. LW__SERVER__PORT=9090 sets server.port = 9090
    //
    // All service configuration fields carry serde defaults, so absent files
    // or an entirely unconfigured environment produces a valid service config
    // with built-in defaults. A malformed file or an environment variable
    // that cannot be coerced to the correct type IS a hard error because it
    // indicates deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/ledger-watch/service")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Toml),
        );

    if let Ok(path) = std::env::var("LW_CONFIG_FILE") {
        config_builder = config_builder.add_source(config::File::with_name(&path).required(true));
    }

    let config: ServiceConfig = config_builder
        .add_source(config::Environment::with_prefix("LW").separator("__"))
        .build()?
        .try_deserialize()?;

    if config.webhooks.secret.is_empty() {
        warn!(
            "No webhook secret configured — every provider delivery will be \
             rejected with 401. Set LW__WEBHOOKS__SECRET before pointing the \
             provider at this service."
        );
    }

    // -------------------------------------------------------------------------
    // Construct stores and engines
    // -------------------------------------------------------------------------
    let event_store = Arc::new(InMemoryEventStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new());
    let reconciliation_store = Arc::new(InMemoryReconciliationStore::new());
    let journeys = Arc::new(JourneyEngine::with_seed_definitions());

    let provider: Arc<dyn ProviderClient> = if config.provider.base_url.is_empty() {
        warn!("No provider base URL configured; using the in-memory provider client");
        Arc::new(StaticProviderClient::new())
    } else {
        Arc::new(HttpProviderClient::new(
            config.provider.base_url.clone(),
            &config.provider.api_token,
            Duration::from_secs(config.provider.request_timeout_seconds),
        )?)
    };

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
        provider,
        reconciliation_store,
        config.reconciliation.to_engine_config(),
    ));
    let reconciliation_token = ControlToken::new();
    let metrics = ServiceMetrics::new()?;

    let state = AppState {
        webhook_secret: WebhookSecret::new(config.webhooks.secret.clone()),
        config: config.clone(),
        event_store,
        mirror,
        journeys: journeys.clone(),
        dispatcher,
        queue_processor: queue_processor.clone(),
        reconciliation: reconciliation.clone(),
        reconciliation_token: reconciliation_token.clone(),
        metrics: metrics.clone(),
    };

    // -------------------------------------------------------------------------
    // Background tasks
    // -------------------------------------------------------------------------
    queue_processor.start();
    metrics.queue_processor_active.set(1);

    spawn_journey_sweep(journeys, &config);
    spawn_scheduled_reconciliation(reconciliation, reconciliation_token.clone(), &config);

    // -------------------------------------------------------------------------
    // Serve until shutdown
    // -------------------------------------------------------------------------
    let result = start_server(state).await;

    queue_processor.stop();
    reconciliation_token.abort();

    if let Err(e) = &result {
        error!(error = %e, "Service exited with error");
    }
    result.map_err(Into::into)
}

/// Periodic stuck/abandonment sweep over journey instances.
fn spawn_journey_sweep(journeys: Arc<JourneyEngine>, config: &ServiceConfig) {
    let interval = Duration::from_secs(config.journeys.sweep_interval_seconds.max(1));
    let stuck_after = config.journeys.stuck_after();
    let abandon_after = config.journeys.abandon_after();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sweep an empty engine
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let outcome = journeys.sweep_stuck(stuck_after, abandon_after);
            if outcome.marked_stuck > 0 || outcome.marked_abandoned > 0 {
                info!(
                    stuck = outcome.marked_stuck,
                    abandoned = outcome.marked_abandoned,
                    "Journey sweep finished"
                );
            }
        }
    });
}

/// Scheduled reconciliation over the most recent window.
///
/// Disabled when `schedule_interval_hours` is zero; operators can always
/// trigger runs through the API.
fn spawn_scheduled_reconciliation(
    reconciliation: Arc<ReconciliationEngine>,
    token: Arc<ControlToken>,
    config: &ServiceConfig,
) {
    let hours = config.reconciliation.schedule_interval_hours;
    if hours == 0 {
        info!("Scheduled reconciliation disabled");
        return;
    }
    let interval = Duration::from_secs(hours * 3600);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if token.is_aborted() {
                break;
            }

            let end = Timestamp::now();
            let start = end.minus(interval);
            match reconciliation
                .perform_batch_reconciliation(ResourceType::Transfer, start, end, None, &token)
                .await
            {
                Ok(run) => info!(
                    run_id = %run.id,
                    status = run.status.as_str(),
                    found = run.metrics.discrepancies_found,
                    "Scheduled reconciliation run finished"
                ),
                Err(e) => warn!(error = %e, "Scheduled reconciliation run failed to start"),
            }
        }
    });
}
