//! # Ledger-Watch Core
//!
//! Core business logic for the ledger-watch payment-provider mirror:
//! webhook event intake, journey tracking, and reconciliation.
//!
//! This crate contains the domain logic for ingesting payment-provider
//! webhook events idempotently, advancing per-resource journey state
//! machines, and reconciling the locally mirrored transfer state against
//! the authoritative provider records.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - The external payment provider is abstracted behind [`ProviderClient`]
//!
//! ## Usage
//!
//! ```rust
//! use ledger_watch_core::{ProviderEventId, ResourceId, ResourceType};
//!
//! let event_id = ProviderEventId::new("c1b2d3e4-0000-0000-0000-000000000001").unwrap();
//! let resource = ResourceId::new("t-77001").unwrap();
//! assert_eq!(ResourceType::Transfer.as_str(), "transfer");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

/// Standard result type for ledger-watch operations
pub type LedgerWatchResult<T> = Result<T, LedgerWatchError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier assigned by the payment provider to a webhook event.
///
/// This is the natural idempotency key for the pipeline: the provider
/// guarantees global uniqueness, and re-deliveries of the same event carry
/// the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderEventId(String);

impl ProviderEventId {
    /// Create new provider event id with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "provider_event_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "provider_event_id".to_string(),
                max_length: 128,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "provider_event_id".to_string(),
                invalid_chars: "non-ASCII or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderEventId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of a business resource mirrored from the provider
/// (a transfer, a customer, a funding source).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create new resource id with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "resource_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "resource_id".to_string(),
                max_length: 128,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "resource_id".to_string(),
                invalid_chars: "non-ASCII or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Extract the trailing path segment of a provider resource URL.
    ///
    /// Provider webhook payloads link the affected resource as
    /// `_links.resource.href`; the id is the last path segment.
    pub fn from_resource_href(href: &str) -> Result<Self, ValidationError> {
        let trimmed = href.trim_end_matches('/');
        let segment = trimmed.rsplit('/').next().unwrap_or("");
        Self::new(segment)
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Kind of mirrored resource an event or reconciliation run refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Transfer,
    Customer,
}

impl ResourceType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transfer" | "transfers" => Ok(Self::Transfer),
            "customer" | "customers" => Ok(Self::Customer),
            _ => Err(ValidationError::InvalidFormat {
                field: "resource_type".to_string(),
                message: format!("unknown resource type '{}'", s),
            }),
        }
    }
}

/// Identifier for tracing requests across system boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp used across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing chrono datetime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("'{}' is not RFC3339", s),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Timestamp a duration in the past relative to this one
    pub fn minus(&self, duration: Duration) -> Self {
        let chrono_duration = chrono::Duration::from_std(duration).unwrap_or_default();
        Self(self.0 - chrono_duration)
    }

    /// Timestamp a duration in the future relative to this one
    pub fn plus(&self, duration: Duration) -> Self {
        let chrono_duration = chrono::Duration::from_std(duration).unwrap_or_default();
        Self(self.0 + chrono_duration)
    }

    /// Elapsed time since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Configuration for retry pacing between queue batches
///
/// The observed provider-facing design uses a fixed inter-batch pause;
/// exponential and linear policies remain available as configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_enabled: bool,
}

impl RetryPolicy {
    /// Create fixed delay retry policy
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter_enabled: false,
        }
    }

    /// Create exponential backoff retry policy
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }

    /// Calculate delay for specific attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let mut delay = self.base_delay.as_millis() as f64;

        for _ in 1..attempt {
            delay *= self.backoff_multiplier;
        }

        if self.jitter_enabled {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let mut hasher = DefaultHasher::new();
            attempt.hash(&mut hasher);
            let hash = hasher.finish();

            // ±25% jitter
            let jitter_factor = 0.75 + (hash % 500) as f64 / 2000.0;
            delay *= jitter_factor;
        }

        let delay_ms = delay.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5), 5)
    }
}

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

impl ValidationError {
    /// Name of the offending field, for structured 400 responses
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::InvalidFormat { field, .. }
            | Self::TooLong { field, .. }
            | Self::InvalidCharacters { field, .. } => field,
        }
    }
}

/// Top-level error type for ledger-watch operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerWatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Not found: {kind} '{id}'")]
    NotFound { kind: String, id: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LedgerWatchError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExternalService { .. } => true,
            Self::Internal { .. } => true,
            Self::Validation(_) => false,
            Self::Authentication { .. } => false,
            Self::NotFound { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Authentication { .. } => ErrorCategory::Security,
            Self::NotFound { .. } => ErrorCategory::Permanent,
            Self::ExternalService { .. } => ErrorCategory::Transient,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook signature verification
pub mod signature;

/// Typed provider event topics
pub mod topic;

/// Durable inbound-event table and processing states
pub mod event_store;

/// Mirrored transfer store and ACH return-code reference
pub mod mirror;

/// Idempotent topic dispatch
pub mod dispatcher;

/// Journey state machine engine
pub mod journey;

/// Background retry loop over queued/failed events
pub mod queue_processor;

/// Authoritative provider abstraction
pub mod provider;

/// Reconciliation engine
pub mod reconciliation;

/// Reconciliation reporting
pub mod report;

// Re-export key types for convenience
pub use dispatcher::{DispatchError, DispatchOutcome, EventDispatcher};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, InboundEvent, ProcessingState,
};
pub use journey::{
    JourneyDefinition, JourneyEngine, JourneyInstance, JourneyStatus, JourneyStep, SweepOutcome,
};
pub use mirror::{
    ach_return_reason, InMemoryMirrorStore, MirrorStore, MirrorStoreError, MirroredTransfer,
    TransferStatus, WebhookHistoryEntry,
};
pub use provider::{ProviderClient, ProviderError, ProviderTransfer, StaticProviderClient};
pub use queue_processor::{QueueProcessor, QueueProcessorConfig};
pub use reconciliation::{
    CheckKind, ControlToken, Discrepancy, DiscrepancyId, InMemoryReconciliationStore,
    ReconciliationConfig, ReconciliationEngine, ReconciliationError, ReconciliationRun,
    ReconciliationStore, Resolution, RunId, RunMetrics, RunStatus, Severity,
};
pub use report::{generate_report, ReconciliationReport, ReportError};
pub use signature::{sign_payload, verify_signature, WebhookSecret};
pub use topic::EventTopic;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
