//! Reconciliation engine.
//!
//! Periodically (or on demand) compares the locally mirrored transfer
//! state against the authoritative provider records for a time window,
//! recording a [`Discrepancy`] for every named check that disagrees.
//! Provider fetches run in fixed-size batches with an inter-batch delay
//! (cooperative backpressure against the provider's rate limits) and honor
//! an external [`ControlToken`] between batches.
//!
//! A run record is never silently dropped: an unrecoverable mid-run error
//! closes it as `failed` with whatever metrics had accumulated.

use crate::{
    mirror::{MirrorStore, MirrorStoreError, MirroredTransfer, TransferStatus},
    provider::{ProviderClient, ProviderTransfer},
    ResourceId, ResourceType, Timestamp, Ulid, ValidationError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, instrument, warn};

// ============================================================================
// Identifier Types
// ============================================================================

/// Unique identifier for reconciliation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    /// Generate new run ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ValidationError::InvalidFormat {
            field: "run_id".to_string(),
            message: "must be a ULID".to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Unique identifier for discrepancies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscrepancyId(Ulid);

impl DiscrepancyId {
    /// Generate new discrepancy ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DiscrepancyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DiscrepancyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DiscrepancyId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ValidationError::InvalidFormat {
            field: "discrepancy_id".to_string(),
            message: "must be a ULID".to_string(),
        })?;
        Ok(Self(ulid))
    }
}

// ============================================================================
// Core Types
// ============================================================================

/// Status of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Aggregated counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_checks: u64,
    pub resources_checked: u64,
    pub discrepancies_found: u64,
    pub discrepancies_resolved: u64,
}

/// One reconciliation sweep over a resource type and date window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub id: RunId,
    pub resource_type: ResourceType,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub status: RunStatus,
    pub metrics: RunMetrics,
    /// Failure detail when `status == failed`
    pub error: Option<String>,
}

/// Named invariant checked per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ExistsInProvider,
    StatusMatches,
    AmountMatches,
}

impl CheckKind {
    /// All checks, in execution order
    pub const ALL: [CheckKind; 3] = [
        CheckKind::ExistsInProvider,
        CheckKind::StatusMatches,
        CheckKind::AmountMatches,
    ];

    /// Get string representation
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExistsInProvider => "exists_in_provider",
            Self::StatusMatches => "status_matches",
            Self::AmountMatches => "amount_matches",
        }
    }

    /// Static severity assignment per check
    pub fn severity(&self) -> Severity {
        match self {
            Self::ExistsInProvider => Severity::Critical,
            Self::AmountMatches => Severity::High,
            Self::StatusMatches => Severity::Medium,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Operator-facing severity of a discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// How a discrepancy was closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolution type, e.g. "manual_override", "auto_recheck"
    #[serde(rename = "type")]
    pub kind: String,

    /// Free-form operator detail
    #[serde(flatten)]
    pub detail: serde_json::Map<String, serde_json::Value>,
}

impl Resolution {
    /// Automatic resolution recorded when a later run finds the check
    /// passing again.
    pub fn auto_recheck(run_id: RunId) -> Self {
        let mut detail = serde_json::Map::new();
        detail.insert(
            "note".to_string(),
            serde_json::Value::String(format!("check passed again during run {}", run_id)),
        );
        Self {
            kind: "auto_recheck".to_string(),
            detail,
        }
    }
}

/// A detected mismatch between mirrored and authoritative state.
///
/// Immutable once resolved except for the resolution metadata; at most one
/// open discrepancy exists per (resource, check) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: DiscrepancyId,
    pub run_id: RunId,
    pub resource_type: ResourceType,
    pub resource_id: ResourceId,
    pub check: CheckKind,
    pub severity: Severity,
    /// What disagreed, in operator terms
    pub description: String,
    pub resolved: bool,
    pub detected_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolution: Option<Resolution>,
}

// ============================================================================
// Control Token
// ============================================================================

/// Cooperative abort/pause control for long-running batch loops.
///
/// Checked between provider-fetch batches. Pause is a spin on a short
/// sleep, not a true suspension; abort wins over pause.
#[derive(Debug, Default)]
pub struct ControlToken {
    aborted: AtomicBool,
    paused: AtomicBool,
}

impl ControlToken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Request the loop to stop at the next batch boundary.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Request the loop to hold at the next batch boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Hold while paused; returns early if aborted while holding.
    pub async fn wait_while_paused(&self) {
        while self.is_paused() && !self.is_aborted() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Pacing configuration for provider fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Resources fetched per batch
    pub batch_size: usize,

    /// Pause between batches
    pub batch_delay: Duration,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(200),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from reconciliation operations
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Run not found: {id}")]
    RunNotFound { id: RunId },

    #[error("Discrepancy not found: {id}")]
    DiscrepancyNotFound { id: DiscrepancyId },

    #[error("Mirror store error: {0}")]
    Mirror(#[from] MirrorStoreError),

    #[error("Reconciliation store error: {message}")]
    Store { message: String },
}

// ============================================================================
// Store Interface
// ============================================================================

/// Persistence for runs and discrepancies.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Persist a run record (insert or replace by id).
    async fn save_run(&self, run: ReconciliationRun) -> Result<(), ReconciliationError>;

    /// Fetch a run by id.
    async fn get_run(&self, id: &RunId) -> Result<Option<ReconciliationRun>, ReconciliationError>;

    /// Runs started at or after the given time, newest first.
    async fn list_runs_since(
        &self,
        since: Timestamp,
    ) -> Result<Vec<ReconciliationRun>, ReconciliationError>;

    /// The open discrepancy for a (resource, check) pair, if any.
    async fn find_open_discrepancy(
        &self,
        resource_id: &ResourceId,
        check: CheckKind,
    ) -> Result<Option<Discrepancy>, ReconciliationError>;

    /// Persist a discrepancy record (insert or replace by id).
    async fn save_discrepancy(&self, discrepancy: Discrepancy) -> Result<(), ReconciliationError>;

    /// Fetch a discrepancy by id.
    async fn get_discrepancy(
        &self,
        id: &DiscrepancyId,
    ) -> Result<Option<Discrepancy>, ReconciliationError>;

    /// All discrepancies recorded under a run.
    async fn list_discrepancies_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<Discrepancy>, ReconciliationError>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Thread-safe in-memory reconciliation store.
pub struct InMemoryReconciliationStore {
    inner: RwLock<ReconciliationTable>,
}

#[derive(Default)]
struct ReconciliationTable {
    runs: HashMap<RunId, ReconciliationRun>,
    discrepancies: HashMap<DiscrepancyId, Discrepancy>,
    /// Insertion order for stable listings
    discrepancy_order: Vec<DiscrepancyId>,
}

impl InMemoryReconciliationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ReconciliationTable::default()),
        }
    }
}

impl Default for InMemoryReconciliationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryReconciliationStore {
    async fn save_run(&self, run: ReconciliationRun) -> Result<(), ReconciliationError> {
        let mut table = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table.runs.insert(run.id, run);
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<ReconciliationRun>, ReconciliationError> {
        let table = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(table.runs.get(id).cloned())
    }

    async fn list_runs_since(
        &self,
        since: Timestamp,
    ) -> Result<Vec<ReconciliationRun>, ReconciliationError> {
        let table = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut runs: Vec<_> = table
            .runs
            .values()
            .filter(|r| r.started_at >= since)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn find_open_discrepancy(
        &self,
        resource_id: &ResourceId,
        check: CheckKind,
    ) -> Result<Option<Discrepancy>, ReconciliationError> {
        let table = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(table
            .discrepancies
            .values()
            .find(|d| !d.resolved && &d.resource_id == resource_id && d.check == check)
            .cloned())
    }

    async fn save_discrepancy(&self, discrepancy: Discrepancy) -> Result<(), ReconciliationError> {
        let mut table = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !table.discrepancies.contains_key(&discrepancy.id) {
            table.discrepancy_order.push(discrepancy.id);
        }
        table.discrepancies.insert(discrepancy.id, discrepancy);
        Ok(())
    }

    async fn get_discrepancy(
        &self,
        id: &DiscrepancyId,
    ) -> Result<Option<Discrepancy>, ReconciliationError> {
        let table = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(table.discrepancies.get(id).cloned())
    }

    async fn list_discrepancies_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Vec<Discrepancy>, ReconciliationError> {
        let table = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(table
            .discrepancy_order
            .iter()
            .filter_map(|id| table.discrepancies.get(id))
            .filter(|d| &d.run_id == run_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Compares mirrored state against authoritative provider state.
pub struct ReconciliationEngine {
    mirror: Arc<dyn MirrorStore>,
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn ReconciliationStore>,
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new(
        mirror: Arc<dyn MirrorStore>,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn ReconciliationStore>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            mirror,
            provider,
            store,
            config,
        }
    }

    /// Access to the underlying run/discrepancy store (read-side callers).
    pub fn store(&self) -> Arc<dyn ReconciliationStore> {
        Arc::clone(&self.store)
    }

    /// Reconcile one resource type over `[start, end]`.
    ///
    /// Always returns a persisted run record: `completed` with final
    /// counts, or `failed` with partial metrics when an unrecoverable
    /// error (or an abort) interrupts the sweep. Per-request pacing
    /// overrides take precedence over the engine's configuration.
    #[instrument(skip(self, token, config_override), fields(resource_type = %resource_type))]
    pub async fn perform_batch_reconciliation(
        &self,
        resource_type: ResourceType,
        start: Timestamp,
        end: Timestamp,
        config_override: Option<ReconciliationConfig>,
        token: &ControlToken,
    ) -> Result<ReconciliationRun, ReconciliationError> {
        if resource_type != ResourceType::Transfer {
            return Err(ValidationError::InvalidFormat {
                field: "resourceType".to_string(),
                message: format!("reconciliation is not supported for '{}'", resource_type),
            }
            .into());
        }
        if end < start {
            return Err(ValidationError::InvalidFormat {
                field: "endDate".to_string(),
                message: "endDate precedes startDate".to_string(),
            }
            .into());
        }

        let config = config_override.unwrap_or_else(|| self.config.clone());
        let batch_size = config.batch_size.max(1);

        let mut run = ReconciliationRun {
            id: RunId::new(),
            resource_type,
            window_start: start,
            window_end: end,
            started_at: Timestamp::now(),
            ended_at: None,
            status: RunStatus::Running,
            metrics: RunMetrics::default(),
            error: None,
        };
        self.store.save_run(run.clone()).await?;

        info!(run_id = %run.id, "Reconciliation run started");

        let mirrored = match self.mirror.list_transfers_in_window(start, end).await {
            Ok(transfers) => transfers,
            Err(e) => {
                return self.close_failed(run, format!("mirror read failed: {}", e)).await;
            }
        };

        let mut batches = mirrored.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            if token.is_aborted() {
                return self.close_failed(run, "aborted by operator".to_string()).await;
            }
            token.wait_while_paused().await;
            if token.is_aborted() {
                return self.close_failed(run, "aborted by operator".to_string()).await;
            }

            for transfer in batch {
                let authoritative = match self.provider.fetch_transfer(&transfer.id).await {
                    Ok(record) => record,
                    Err(e) => {
                        return self
                            .close_failed(run, format!("provider fetch failed: {}", e))
                            .await;
                    }
                };

                self.check_resource(&mut run, transfer, authoritative.as_ref())
                    .await?;
                run.metrics.resources_checked += 1;
            }

            // Persist progress so an interrupted run keeps partial metrics
            self.store.save_run(run.clone()).await?;

            if batches.peek().is_some() && !config.batch_delay.is_zero() {
                tokio::time::sleep(config.batch_delay).await;
            }
        }

        run.status = RunStatus::Completed;
        run.ended_at = Some(Timestamp::now());
        self.store.save_run(run.clone()).await?;

        info!(
            run_id = %run.id,
            resources = run.metrics.resources_checked,
            found = run.metrics.discrepancies_found,
            resolved = run.metrics.discrepancies_resolved,
            "Reconciliation run completed"
        );
        Ok(run)
    }

    /// Backfill reconciliation over trailing day-sized windows.
    ///
    /// Used after downtime: reconciles each of the last `days_back` days
    /// in order, oldest window first. Failed windows do not stop later
    /// ones; an abort does.
    #[instrument(skip(self, token))]
    pub async fn perform_catch_up_reconciliation(
        &self,
        resource_type: ResourceType,
        days_back: u32,
        token: &ControlToken,
    ) -> Result<Vec<ReconciliationRun>, ReconciliationError> {
        if days_back == 0 || days_back > 90 {
            return Err(ValidationError::InvalidFormat {
                field: "daysBack".to_string(),
                message: "must be between 1 and 90".to_string(),
            }
            .into());
        }

        let now = Timestamp::now();
        let day = Duration::from_secs(24 * 60 * 60);
        let mut runs = Vec::with_capacity(days_back as usize);

        for offset in (0..days_back).rev() {
            if token.is_aborted() {
                break;
            }
            let window_end = now.minus(day * offset);
            let window_start = now.minus(day * (offset + 1));

            let run = self
                .perform_batch_reconciliation(resource_type, window_start, window_end, None, token)
                .await?;
            runs.push(run);
        }

        Ok(runs)
    }

    /// Resolve a discrepancy.
    ///
    /// Idempotent: resolving an already-resolved discrepancy returns the
    /// stored record unchanged rather than erroring.
    #[instrument(skip(self, resolution), fields(discrepancy_id = %id))]
    pub async fn resolve_discrepancy(
        &self,
        id: &DiscrepancyId,
        resolution: Resolution,
    ) -> Result<Discrepancy, ReconciliationError> {
        let mut discrepancy = self
            .store
            .get_discrepancy(id)
            .await?
            .ok_or(ReconciliationError::DiscrepancyNotFound { id: *id })?;

        if discrepancy.resolved {
            info!("Discrepancy already resolved; resolve is a no-op");
            return Ok(discrepancy);
        }

        discrepancy.resolved = true;
        discrepancy.resolved_at = Some(Timestamp::now());
        discrepancy.resolution = Some(resolution);
        self.store.save_discrepancy(discrepancy.clone()).await?;

        info!(
            resource_id = %discrepancy.resource_id,
            check = %discrepancy.check,
            "Discrepancy resolved"
        );
        Ok(discrepancy)
    }

    /// Run the fixed check list for one mirrored transfer.
    async fn check_resource(
        &self,
        run: &mut ReconciliationRun,
        mirrored: &MirroredTransfer,
        authoritative: Option<&ProviderTransfer>,
    ) -> Result<(), ReconciliationError> {
        for check in CheckKind::ALL {
            let verdict = evaluate_check(check, mirrored, authoritative);
            run.metrics.total_checks += 1;

            match verdict {
                CheckVerdict::Pass => {
                    // A previously open discrepancy whose check now passes
                    // is resolved automatically.
                    if let Some(open) = self
                        .store
                        .find_open_discrepancy(&mirrored.id, check)
                        .await?
                    {
                        let mut resolved = open;
                        resolved.resolved = true;
                        resolved.resolved_at = Some(Timestamp::now());
                        resolved.resolution = Some(Resolution::auto_recheck(run.id));
                        self.store.save_discrepancy(resolved).await?;
                        run.metrics.discrepancies_resolved += 1;
                    }
                }
                CheckVerdict::Fail(description) => {
                    // At most one open discrepancy per (resource, check)
                    if self
                        .store
                        .find_open_discrepancy(&mirrored.id, check)
                        .await?
                        .is_none()
                    {
                        self.store
                            .save_discrepancy(Discrepancy {
                                id: DiscrepancyId::new(),
                                run_id: run.id,
                                resource_type: run.resource_type,
                                resource_id: mirrored.id.clone(),
                                check,
                                severity: check.severity(),
                                description,
                                resolved: false,
                                detected_at: Timestamp::now(),
                                resolved_at: None,
                                resolution: None,
                            })
                            .await?;
                        run.metrics.discrepancies_found += 1;
                    }
                }
                CheckVerdict::Skipped => {}
            }
        }
        Ok(())
    }

    async fn close_failed(
        &self,
        mut run: ReconciliationRun,
        error: String,
    ) -> Result<ReconciliationRun, ReconciliationError> {
        warn!(run_id = %run.id, error = %error, "Reconciliation run failed; partial metrics preserved");
        run.status = RunStatus::Failed;
        run.ended_at = Some(Timestamp::now());
        run.error = Some(error);
        self.store.save_run(run.clone()).await?;
        Ok(run)
    }
}

// ============================================================================
// Checks
// ============================================================================

enum CheckVerdict {
    Pass,
    Fail(String),
    /// Not evaluable (e.g. the provider record is missing)
    Skipped,
}

fn evaluate_check(
    check: CheckKind,
    mirrored: &MirroredTransfer,
    authoritative: Option<&ProviderTransfer>,
) -> CheckVerdict {
    match check {
        CheckKind::ExistsInProvider => match authoritative {
            Some(_) => CheckVerdict::Pass,
            None => CheckVerdict::Fail(format!(
                "transfer {} is mirrored locally but unknown to the provider",
                mirrored.id
            )),
        },
        CheckKind::StatusMatches => match authoritative {
            None => CheckVerdict::Skipped,
            Some(provider) => {
                if provider_status_equivalent(mirrored.status, &provider.status) {
                    CheckVerdict::Pass
                } else {
                    CheckVerdict::Fail(format!(
                        "mirrored status '{}' disagrees with provider status '{}'",
                        mirrored.status.as_str(),
                        provider.status
                    ))
                }
            }
        },
        CheckKind::AmountMatches => match authoritative {
            None => CheckVerdict::Skipped,
            Some(provider) => {
                if mirrored.amount == provider.amount && mirrored.currency == provider.currency {
                    CheckVerdict::Pass
                } else {
                    CheckVerdict::Fail(format!(
                        "mirrored amount {} {} disagrees with provider amount {} {}",
                        mirrored.amount, mirrored.currency, provider.amount, provider.currency
                    ))
                }
            }
        },
    }
}

/// Map the provider's status vocabulary onto the mirrored status enum.
///
/// The provider reports settled transfers as "processed"; everything else
/// matches the mirrored wording.
fn provider_status_equivalent(mirrored: TransferStatus, provider_status: &str) -> bool {
    let normalized = match provider_status {
        "processed" => "completed",
        other => other,
    };
    mirrored.as_str() == normalized
}

#[cfg(test)]
#[path = "reconciliation_tests.rs"]
mod tests;
