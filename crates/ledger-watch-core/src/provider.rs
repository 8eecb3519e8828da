//! Authoritative provider abstraction.
//!
//! Reconciliation needs fresh provider state for each mirrored transfer.
//! The provider's HTTP client lives outside this crate; here it is a trait
//! returning typed records, with a static in-memory implementation for
//! tests and development.

use crate::{ResourceId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

// ============================================================================
// Core Types
// ============================================================================

/// A transfer record as the provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTransfer {
    pub id: ResourceId,
    /// Provider-side status string, e.g. "processed", "failed"
    pub status: String,
    /// Decimal amount as the provider formats it, e.g. "42.50"
    pub amount: String,
    pub currency: String,
    pub created_at: Timestamp,
}

/// Errors from the provider client
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request failed: {message}")]
    RequestFailed { message: String },

    #[error("Provider rejected the request: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("Provider rate limit hit")]
    RateLimited,
}

impl ProviderError {
    /// Check if the error is transient and the fetch worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed { .. } => true,
            Self::RateLimited => true,
            Self::Rejected { .. } => false,
        }
    }
}

// ============================================================================
// Client Interface
// ============================================================================

/// Read access to authoritative provider records.
///
/// `Ok(None)` means the provider does not know the resource. That is a
/// reconciliation finding, not an error.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetch the authoritative record for a transfer.
    async fn fetch_transfer(
        &self,
        id: &ResourceId,
    ) -> Result<Option<ProviderTransfer>, ProviderError>;
}

// ============================================================================
// Static Implementation
// ============================================================================

/// Provider client backed by a fixed in-memory record set.
///
/// Used by tests and local development; records can be added and removed
/// to stage discrepancy scenarios.
pub struct StaticProviderClient {
    records: RwLock<HashMap<ResourceId, ProviderTransfer>>,
    /// When set, every fetch fails with a transient error
    fail_all: RwLock<bool>,
    /// Ids whose fetches fail with a transient error
    fail_ids: RwLock<std::collections::HashSet<ResourceId>>,
}

impl StaticProviderClient {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            fail_all: RwLock::new(false),
            fail_ids: RwLock::new(std::collections::HashSet::new()),
        }
    }

    /// Stage a provider-side record.
    pub fn put(&self, record: ProviderTransfer) {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.insert(record.id.clone(), record);
    }

    /// Remove a provider-side record (stages an "exists" discrepancy).
    pub fn remove(&self, id: &ResourceId) {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.remove(id);
    }

    /// Make every subsequent fetch fail with a transient error.
    pub fn set_fail_all(&self, fail: bool) {
        let mut flag = self
            .fail_all
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *flag = fail;
    }

    /// Make fetches for one id fail with a transient error.
    pub fn fail_on(&self, id: ResourceId) {
        let mut ids = self
            .fail_ids
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.insert(id);
    }
}

impl Default for StaticProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for StaticProviderClient {
    async fn fetch_transfer(
        &self,
        id: &ResourceId,
    ) -> Result<Option<ProviderTransfer>, ProviderError> {
        let failing = *self
            .fail_all
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id_failing = self
            .fail_ids
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(id);
        if failing || id_failing {
            return Err(ProviderError::RequestFailed {
                message: "provider unavailable".to_string(),
            });
        }

        let records = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.get(id).cloned())
    }
}
