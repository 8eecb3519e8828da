//! # Ledger-Watch HTTP Service
//!
//! HTTP layer for the ledger-watch pipeline:
//! - provider webhook intake with signature verification
//! - reconciliation triggers, history, and reports
//! - discrepancy resolution
//! - operational endpoints (queue control, journeys, health, metrics)
//!
//! Every dependency is an explicit field on [`AppState`], constructed once
//! at process start and handed to the router; there are no module-level
//! singletons to reach for.

// Public modules
pub mod errors;
pub mod metrics;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use errors::ApiError;
use ledger_watch_core::{
    generate_report, verify_signature, ControlToken, CorrelationId, DispatchOutcome,
    EventDispatcher, EventStore, EventTopic, InboundEvent, JourneyEngine, JourneyInstance,
    MirrorStore, ProcessingState, ProviderEventId, QueueProcessor, QueueProcessorConfig,
    ReconciliationConfig, ReconciliationEngine, ReconciliationError, ReconciliationReport,
    ReconciliationRun, ReportError, Resolution, ResourceId, ResourceType, RetryPolicy, RunId,
    Timestamp, WebhookSecret,
};
use metrics::ServiceMetrics;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
///
/// Constructed once in the service binary and injected into every handler;
/// background tasks receive clones of the same Arcs.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Shared webhook signing secret
    pub webhook_secret: WebhookSecret,

    /// Durable inbound-event table
    pub event_store: Arc<dyn EventStore>,

    /// Mirrored transfer store
    pub mirror: Arc<dyn MirrorStore>,

    /// Journey state machine engine
    pub journeys: Arc<JourneyEngine>,

    /// Idempotent topic dispatch
    pub dispatcher: Arc<EventDispatcher>,

    /// Background retry loop
    pub queue_processor: Arc<QueueProcessor>,

    /// Reconciliation engine
    pub reconciliation: Arc<ReconciliationEngine>,

    /// Abort/pause control for reconciliation batch loops
    pub reconciliation_token: Arc<ControlToken>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration.
///
/// Every field carries a serde default so an unconfigured environment
/// yields a runnable development setup; files and `LW__*` environment
/// variables override per field.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub webhooks: WebhookConfig,
    pub queue: QueueConfig,
    pub journeys: JourneyConfig,
    pub reconciliation: ReconciliationSettings,
    pub provider: ProviderSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Webhook intake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared HMAC secret; empty means every delivery is rejected
    pub secret: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
        }
    }
}

/// Queue processor pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub batch_delay_seconds: u64,
    pub idle_delay_seconds: u64,
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_delay_seconds: 5,
            idle_delay_seconds: 15,
            max_attempts: 5,
        }
    }
}

impl QueueConfig {
    /// Convert to the core processor configuration
    pub fn to_processor_config(&self) -> QueueProcessorConfig {
        QueueProcessorConfig {
            batch_size: self.batch_size,
            pacing: RetryPolicy::fixed(
                Duration::from_secs(self.batch_delay_seconds),
                self.max_attempts,
            ),
            idle_delay: Duration::from_secs(self.idle_delay_seconds),
            max_attempts: self.max_attempts,
        }
    }
}

/// Journey sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JourneyConfig {
    /// Inactivity before an active journey is marked stuck
    pub stuck_after_minutes: u64,

    /// Inactivity before a journey is closed as abandoned
    pub abandon_after_minutes: u64,

    /// Sweep cadence
    pub sweep_interval_seconds: u64,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            stuck_after_minutes: 120,
            abandon_after_minutes: 72 * 60,
            sweep_interval_seconds: 300,
        }
    }
}

impl JourneyConfig {
    pub fn stuck_after(&self) -> Duration {
        Duration::from_secs(self.stuck_after_minutes * 60)
    }

    pub fn abandon_after(&self) -> Duration {
        Duration::from_secs(self.abandon_after_minutes * 60)
    }
}

/// Reconciliation pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationSettings {
    /// Provider fetches per batch
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,

    /// Cadence for the scheduled sweep; zero disables it
    pub schedule_interval_hours: u64,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 200,
            schedule_interval_hours: 0,
        }
    }
}

impl ReconciliationSettings {
    /// Convert to the core engine configuration
    pub fn to_engine_config(&self) -> ReconciliationConfig {
        ReconciliationConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }
}

/// Payment-provider API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider REST base URL; empty selects the in-memory client
    pub base_url: String,

    /// Bearer token for provider API calls
    pub api_token: String,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            request_timeout_seconds: 10,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/api/webhooks", post(handle_webhook))
        // Legacy path kept for provider configurations that predate the
        // /api prefix; forwards headers and raw body byte-for-byte.
        .route("/webhooks", post(handle_legacy_webhook));

    let reconciliation_routes = Router::new()
        .route("/api/reconciliation", post(trigger_reconciliation))
        .route("/api/reconciliation/history", get(reconciliation_history))
        .route("/api/reconciliation/report", get(reconciliation_report))
        .route(
            "/api/discrepancies/{discrepancy_id}/resolve",
            post(resolve_discrepancy),
        );

    let operational_routes = Router::new()
        .route("/api/journeys", get(list_journeys))
        .route("/api/queue/status", get(queue_status))
        .route("/api/queue/start", post(queue_start))
        .route("/api/queue/stop", post(queue_stop));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(reconciliation_routes)
        .merge(operational_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Request logging middleware with correlation ID tracking.
///
/// Extracts `x-correlation-id` (or generates one), logs request start and
/// completion with structured fields, and propagates the id through the
/// response headers so support tickets can be matched to log lines.
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| CorrelationId::new().to_string());

    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        tracing::error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Start HTTP server with graceful shutdown
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let config = state.config.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ServiceError::BindFailed {
            address: format!("{}:{}", config.server.host, config.server.port),
            message: format!("invalid bind address: {}", e),
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!(
                    "Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout",
                    shutdown_timeout.as_secs()
                );
            },
            _ = terminate => {
                info!(
                    "Received SIGTERM, initiating graceful shutdown with {}s timeout",
                    shutdown_timeout.as_secs()
                );
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Wire shape of a provider webhook delivery.
#[derive(Debug, Deserialize)]
struct ProviderWebhook {
    id: Option<String>,
    topic: Option<String>,
    #[serde(rename = "_links")]
    links: Option<WebhookLinks>,
}

#[derive(Debug, Deserialize)]
struct WebhookLinks {
    resource: Option<WebhookHref>,
}

#[derive(Debug, Deserialize)]
struct WebhookHref {
    href: String,
}

/// Handle provider webhook deliveries.
///
/// Response policy: the provider treats any non-2xx as a delivery failure
/// and retries, so every authenticated delivery is acknowledged with 200,
/// including duplicates, unroutable topics, and events whose processing
/// failed inline and was deferred to the queue processor. The only
/// non-2xx responses are 401 (signature failure, nothing persisted) and
/// 400 (authenticated but structurally unusable payload).
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("x-provider-signature")
        .and_then(|v| v.to_str().ok());

    if !verify_signature(&body, signature, &state.webhook_secret) {
        state.metrics.signature_failures_total.inc();
        return Err(ApiError::Authentication {
            message: "webhook signature verification failed".to_string(),
        });
    }

    state.metrics.events_received_total.inc();
    let timer = state.metrics.webhook_duration_seconds.start_timer();

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid_field("body", format!("payload is not JSON: {}", e)))?;
    let envelope: ProviderWebhook = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::invalid_field("body", format!("malformed envelope: {}", e)))?;

    let event_id = envelope
        .id
        .ok_or_else(|| ApiError::missing_field("id"))
        .and_then(|id| ProviderEventId::new(id).map_err(ApiError::from))?;
    let topic = envelope
        .topic
        .map(|t| EventTopic::parse(&t))
        .ok_or_else(|| ApiError::missing_field("topic"))?;

    let resource_id = envelope
        .links
        .and_then(|l| l.resource)
        .and_then(|r| ResourceId::from_resource_href(&r.href).ok());

    let event = InboundEvent::received(event_id.clone(), topic, resource_id, payload);
    match state.event_store.insert_new(event).await {
        Ok(_) => {}
        Err(ledger_watch_core::EventStoreError::Duplicate { existing }) => {
            info!(event_id = %event_id, state = existing.state.as_str(), "Duplicate delivery acknowledged");
            state.metrics.events_duplicate_total.inc();
            timer.observe_duration();
            return Ok(Json(WebhookAck {
                event_id,
                status: "duplicate".to_string(),
                message: "event was already received".to_string(),
            }));
        }
        Err(e) => {
            timer.observe_duration();
            return Err(ApiError::Unavailable {
                message: format!("event store rejected the record: {}", e),
            });
        }
    }

    if let Err(e) = state.event_store.mark_queued(&event_id).await {
        warn!(event_id = %event_id, error = %e, "Could not queue event after insert");
    }

    // Inline fast path; failures are recorded on the event and the queue
    // processor retries them.
    let status = match state.dispatcher.dispatch(&event_id).await {
        Ok(DispatchOutcome::Completed) => "processed",
        Ok(DispatchOutcome::Ignored) => {
            state.metrics.events_ignored_total.inc();
            "ignored"
        }
        Ok(DispatchOutcome::Duplicate) => "duplicate",
        Ok(DispatchOutcome::Failed { .. }) => {
            state.metrics.events_deferred_total.inc();
            "deferred"
        }
        Ok(DispatchOutcome::Quarantined { .. }) => {
            state.metrics.events_quarantined_total.inc();
            "quarantined"
        }
        Err(e) => {
            warn!(event_id = %event_id, error = %e, "Inline dispatch errored; event left for retry");
            state.metrics.events_deferred_total.inc();
            "deferred"
        }
    };

    timer.observe_duration();
    Ok(Json(WebhookAck {
        event_id,
        status: status.to_string(),
        message: "webhook acknowledged".to_string(),
    }))
}

/// Legacy webhook path.
///
/// Forwards the delivery byte-for-byte (same headers, same raw body) to
/// the current handler so signatures keep verifying.
#[instrument(skip(state, headers, body))]
pub async fn handle_legacy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    info!("Webhook received on legacy path; forwarding");
    handle_webhook(State(state), headers, body).await
}

// ============================================================================
// Reconciliation Handlers
// ============================================================================

/// Request body for `POST /api/reconciliation`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRequest {
    #[serde(default)]
    pub catch_up: bool,
    pub resource_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days_back: Option<u32>,
    pub config: Option<PacingOverride>,
}

/// Optional per-request pacing override
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingOverride {
    pub batch_size: Option<usize>,
    pub batch_delay_ms: Option<u64>,
}

/// Trigger a reconciliation sweep (windowed or catch-up).
#[instrument(skip(state, request))]
pub async fn trigger_reconciliation(
    State(state): State<AppState>,
    Json(request): Json<ReconciliationRequest>,
) -> Result<Json<ReconciliationTriggerResponse>, ApiError> {
    let mut field_errors = Vec::new();

    let resource_type = match &request.resource_type {
        None => {
            field_errors.push(errors::FieldError {
                field: "resourceType".to_string(),
                message: "Field 'resourceType' is required".to_string(),
            });
            None
        }
        Some(raw) => match raw.parse::<ResourceType>() {
            Ok(rt) => Some(rt),
            Err(e) => {
                field_errors.push(errors::FieldError {
                    field: "resourceType".to_string(),
                    message: e.to_string(),
                });
                None
            }
        },
    };

    if request.catch_up {
        if request.days_back.is_none() {
            field_errors.push(errors::FieldError {
                field: "daysBack".to_string(),
                message: "Field 'daysBack' is required for catch-up runs".to_string(),
            });
        }
    } else {
        for (field, value) in [
            ("startDate", &request.start_date),
            ("endDate", &request.end_date),
        ] {
            if value.is_none() {
                field_errors.push(errors::FieldError {
                    field: field.to_string(),
                    message: format!("Field '{}' is required for windowed runs", field),
                });
            }
        }
    }

    if !field_errors.is_empty() {
        return Err(ApiError::Validation {
            errors: field_errors,
        });
    }
    let resource_type = resource_type.expect("validated above");

    if request.catch_up {
        let days_back = request.days_back.expect("validated above");
        let runs = state
            .reconciliation
            .perform_catch_up_reconciliation(resource_type, days_back, &state.reconciliation_token)
            .await
            .map_err(map_reconciliation_error)?;

        state
            .metrics
            .reconciliation_runs_total
            .inc_by(runs.len() as u64);
        record_run_metrics(&state, &runs);

        Ok(Json(ReconciliationTriggerResponse {
            success: true,
            run: None,
            runs: Some(runs),
        }))
    } else {
        let start = parse_date_field("startDate", request.start_date.as_deref())?;
        let end = parse_date_field("endDate", request.end_date.as_deref())?;

        let config_override = request.config.map(|c| {
            let defaults = state.config.reconciliation.to_engine_config();
            ReconciliationConfig {
                batch_size: c.batch_size.unwrap_or(defaults.batch_size),
                batch_delay: c
                    .batch_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.batch_delay),
            }
        });

        let run = state
            .reconciliation
            .perform_batch_reconciliation(
                resource_type,
                start,
                end,
                config_override,
                &state.reconciliation_token,
            )
            .await
            .map_err(map_reconciliation_error)?;

        state.metrics.reconciliation_runs_total.inc();
        record_run_metrics(&state, std::slice::from_ref(&run));

        Ok(Json(ReconciliationTriggerResponse {
            success: true,
            run: Some(run),
            runs: None,
        }))
    }
}

fn record_run_metrics(state: &AppState, runs: &[ReconciliationRun]) {
    for run in runs {
        if run.status == ledger_watch_core::RunStatus::Failed {
            state.metrics.reconciliation_failures_total.inc();
        }
        state
            .metrics
            .discrepancies_found_total
            .inc_by(run.metrics.discrepancies_found);
        state
            .metrics
            .discrepancies_resolved_total
            .inc_by(run.metrics.discrepancies_resolved);
    }
}

fn parse_date_field(field: &str, value: Option<&str>) -> Result<Timestamp, ApiError> {
    let value = value.ok_or_else(|| ApiError::missing_field(field))?;
    Timestamp::from_rfc3339(value)
        .map_err(|_| ApiError::invalid_field(field, format!("'{}' is not an RFC3339 date", value)))
}

fn map_reconciliation_error(err: ReconciliationError) -> ApiError {
    match err {
        ReconciliationError::Validation(e) => ApiError::from(e),
        ReconciliationError::RunNotFound { id } => ApiError::NotFound {
            kind: "reconciliation run",
            id: id.to_string(),
        },
        ReconciliationError::DiscrepancyNotFound { id } => ApiError::NotFound {
            kind: "discrepancy",
            id: id.to_string(),
        },
        other => ApiError::Internal {
            message: other.to_string(),
        },
    }
}

/// Request body for discrepancy resolution.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution: Option<serde_json::Value>,
}

/// Resolve a discrepancy by id.
#[instrument(skip(state, request))]
pub async fn resolve_discrepancy(
    State(state): State<AppState>,
    Path(discrepancy_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let resolution_value = request
        .resolution
        .ok_or_else(|| ApiError::missing_field("resolution"))?;

    if resolution_value
        .get("type")
        .and_then(|t| t.as_str())
        .map_or(true, str::is_empty)
    {
        return Err(ApiError::missing_field("resolution.type"));
    }

    let resolution: Resolution = serde_json::from_value(resolution_value)
        .map_err(|e| ApiError::invalid_field("resolution", e.to_string()))?;

    let id = discrepancy_id
        .parse()
        .map_err(|_| ApiError::NotFound {
            kind: "discrepancy",
            id: discrepancy_id.clone(),
        })?;

    let discrepancy = state
        .reconciliation
        .resolve_discrepancy(&id, resolution)
        .await
        .map_err(map_reconciliation_error)?;

    state.metrics.discrepancies_resolved_total.inc();
    Ok(Json(ResolveResponse {
        success: true,
        discrepancy,
    }))
}

/// Query parameters for reconciliation history
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub hours: Option<u64>,
    #[serde(rename = "runId")]
    pub run_id: Option<String>,
}

/// Reconciliation history: recent runs, or one run's report when `runId`
/// is given.
#[instrument(skip(state))]
pub async fn reconciliation_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    if let Some(run_id) = params.run_id {
        let report = load_report(&state, &run_id).await?;
        return Ok(Json(HistoryResponse {
            success: true,
            runs: None,
            report: Some(report),
        }));
    }

    let hours = params.hours.unwrap_or(24).min(24 * 90);
    let since = Timestamp::now().minus(Duration::from_secs(hours * 3600));
    let runs = state
        .reconciliation
        .store()
        .list_runs_since(since)
        .await
        .map_err(map_reconciliation_error)?;

    Ok(Json(HistoryResponse {
        success: true,
        runs: Some(runs),
        report: None,
    }))
}

/// Query parameters for a single-run report
#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(rename = "runId")]
    pub run_id: Option<String>,
}

/// Full report for one reconciliation run.
#[instrument(skip(state))]
pub async fn reconciliation_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportResponse>, ApiError> {
    let run_id = params
        .run_id
        .ok_or_else(|| ApiError::missing_field("runId"))?;
    let report = load_report(&state, &run_id).await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}

async fn load_report(state: &AppState, run_id: &str) -> Result<ReconciliationReport, ApiError> {
    let id: RunId = run_id.parse().map_err(|_| ApiError::NotFound {
        kind: "reconciliation run",
        id: run_id.to_string(),
    })?;

    generate_report(state.reconciliation.store().as_ref(), &id)
        .await
        .map_err(|e| match e {
            ReportError::RunNotFound { id } => ApiError::NotFound {
                kind: "reconciliation run",
                id: id.to_string(),
            },
            ReportError::Store(inner) => map_reconciliation_error(inner),
        })
}

// ============================================================================
// Operational Handlers
// ============================================================================

/// Query parameters for journey listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyParams {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

/// Operator view of journey instances with recommended actions.
#[instrument(skip(state))]
pub async fn list_journeys(
    State(state): State<AppState>,
    Query(params): Query<JourneyParams>,
) -> Result<Json<JourneyListResponse>, ApiError> {
    let resource_type = params
        .resource_type
        .as_deref()
        .map(str::parse::<ResourceType>)
        .transpose()
        .map_err(ApiError::from)?;
    let resource_id = params
        .resource_id
        .as_deref()
        .map(ResourceId::new)
        .transpose()
        .map_err(ApiError::from)?;

    let journeys = state
        .journeys
        .list_instances(resource_type, resource_id.as_ref())
        .into_iter()
        .map(|instance| {
            let recommended_action = JourneyEngine::recommend_action(&instance);
            JourneyView {
                instance,
                recommended_action,
            }
        })
        .collect::<Vec<_>>();

    Ok(Json(JourneyListResponse {
        total: journeys.len(),
        journeys,
    }))
}

/// Queue processor status with event-state counts.
#[instrument(skip(state))]
pub async fn queue_status(
    State(state): State<AppState>,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let counts = state
        .event_store
        .state_counts()
        .await
        .map_err(|e| ApiError::Internal {
            message: e.to_string(),
        })?;

    let count_for = |s: ProcessingState| counts.get(&s).copied().unwrap_or(0);
    Ok(Json(QueueStatusResponse {
        active: state.queue_processor.is_active(),
        received: count_for(ProcessingState::Received),
        queued: count_for(ProcessingState::Queued),
        processing: count_for(ProcessingState::Processing),
        completed: count_for(ProcessingState::Completed),
        failed: count_for(ProcessingState::Failed),
        quarantined: count_for(ProcessingState::Quarantined),
    }))
}

/// Start the queue processor (no-op when already running).
#[instrument(skip(state))]
pub async fn queue_start(State(state): State<AppState>) -> Json<QueueControlResponse> {
    state.queue_processor.start();
    state.metrics.queue_processor_active.set(1);
    Json(QueueControlResponse {
        active: state.queue_processor.is_active(),
    })
}

/// Request the queue processor to stop at the next batch boundary.
#[instrument(skip(state))]
pub async fn queue_stop(State(state): State<AppState>) -> Json<QueueControlResponse> {
    state.queue_processor.stop();
    state.metrics.queue_processor_active.set(0);
    Json(QueueControlResponse {
        active: state.queue_processor.is_active(),
    })
}

// ============================================================================
// Health and Observability Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip(_state))]
async fn handle_health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check for load balancers
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    // Ready once the event store answers; the in-memory store always does,
    // a relational store may not during startup.
    let ready = state.event_store.state_counts().await.is_ok();
    let response = ReadinessResponse {
        ready,
        timestamp: Timestamp::now(),
    };
    if ready {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .render()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// Response Types
// ============================================================================

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub event_id: ProviderEventId,
    pub status: String,
    pub message: String,
}

/// Reconciliation trigger response
#[derive(Debug, Serialize)]
pub struct ReconciliationTriggerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<ReconciliationRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<ReconciliationRun>>,
}

/// Discrepancy resolution response
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub success: bool,
    pub discrepancy: ledger_watch_core::Discrepancy,
}

/// Reconciliation history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<ReconciliationRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReconciliationReport>,
}

/// Single-run report response
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub report: ReconciliationReport,
}

/// One journey with its recommended operator action
#[derive(Debug, Serialize)]
pub struct JourneyView {
    #[serde(flatten)]
    pub instance: JourneyInstance,
    pub recommended_action: String,
}

/// Journey listing response
#[derive(Debug, Serialize)]
pub struct JourneyListResponse {
    pub total: usize,
    pub journeys: Vec<JourneyView>,
}

/// Queue processor status response
#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub active: bool,
    pub received: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub quarantined: usize,
}

/// Queue processor control response
#[derive(Debug, Serialize)]
pub struct QueueControlResponse {
    pub active: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
}

// ============================================================================
// Error Types
// ============================================================================

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
