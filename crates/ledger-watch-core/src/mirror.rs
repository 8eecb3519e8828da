//! Mirrored transfer store.
//!
//! The local copy of each provider transfer that support staff work
//! against. Topic handlers mutate the status fields here and append the raw
//! event envelope to the transfer's webhook history, which is append-only
//! and audit-facing.

use crate::{topic::EventTopic, ProviderEventId, ResourceId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

// ============================================================================
// Core Types
// ============================================================================

/// Mirrored status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Created,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Returned,
    Reclaimed,
}

impl TransferStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::Reclaimed => "reclaimed",
        }
    }
}

/// One entry in a transfer's append-only webhook history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookHistoryEntry {
    pub event_id: ProviderEventId,
    pub topic: EventTopic,
    pub received_at: Timestamp,
    pub payload: serde_json::Value,
}

/// Local mirror of a provider transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirroredTransfer {
    pub id: ResourceId,
    pub status: TransferStatus,
    /// Decimal amount as the provider formats it, e.g. "42.50"
    pub amount: String,
    pub currency: String,
    pub created_at: Timestamp,
    /// Set when the transfer cleared
    pub processed_at: Option<Timestamp>,
    /// ACH return code, e.g. "R01", when the transfer was returned
    pub return_code: Option<String>,
    /// Human-readable reason resolved from the return-code table
    pub failure_reason: Option<String>,
    /// Append-only audit trail of every webhook that touched this transfer
    pub webhook_history: Vec<WebhookHistoryEntry>,
    pub updated_at: Timestamp,
}

impl MirroredTransfer {
    /// Build a new mirror record in `created` state.
    pub fn new(id: ResourceId, amount: impl Into<String>, currency: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            status: TransferStatus::Created,
            amount: amount.into(),
            currency: currency.into(),
            created_at: now,
            processed_at: None,
            return_code: None,
            failure_reason: None,
            webhook_history: Vec::new(),
            updated_at: now,
        }
    }
}

// ============================================================================
// ACH Return-Code Reference
// ============================================================================

/// Resolve an ACH return code to its human-readable reason.
///
/// Unlisted codes resolve to a generic description so operators always see
/// something actionable rather than a bare code.
pub fn ach_return_reason(code: &str) -> String {
    let reason = match code {
        "R01" => "Insufficient funds",
        "R02" => "Bank account closed",
        "R03" => "No bank account / unable to locate account",
        "R04" => "Invalid bank account number",
        "R05" => "Unauthorized debit to consumer account",
        "R07" => "Authorization revoked by customer",
        "R08" => "Payment stopped",
        "R09" => "Uncollected funds",
        "R10" => "Customer advises not authorized",
        "R16" => "Bank account frozen",
        "R20" => "Non-transaction account",
        "R29" => "Corporate customer advises not authorized",
        _ => return format!("ACH return ({})", code),
    };
    reason.to_string()
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from mirror store operations
#[derive(Debug, thiserror::Error)]
pub enum MirrorStoreError {
    #[error("Transfer not found: {id}")]
    NotFound { id: ResourceId },

    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },
}

impl MirrorStoreError {
    /// Check if the error is transient and the operation worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }
}

// ============================================================================
// Store Interface
// ============================================================================

/// Interface for the mirrored transfer store.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Fetch a mirrored transfer by id.
    async fn get_transfer(&self, id: &ResourceId)
        -> Result<Option<MirroredTransfer>, MirrorStoreError>;

    /// Insert or replace a mirrored transfer.
    async fn upsert_transfer(&self, transfer: MirroredTransfer) -> Result<(), MirrorStoreError>;

    /// Apply a status change to a transfer.
    ///
    /// Missing transfers are created as thin placeholder mirrors first;
    /// the provider may deliver lifecycle events for transfers created
    /// before this service started mirroring.
    async fn apply_status(
        &self,
        id: &ResourceId,
        status: TransferStatus,
        return_code: Option<&str>,
    ) -> Result<MirroredTransfer, MirrorStoreError>;

    /// Append an entry to a transfer's webhook history.
    async fn append_webhook_history(
        &self,
        id: &ResourceId,
        entry: WebhookHistoryEntry,
    ) -> Result<(), MirrorStoreError>;

    /// List transfers whose `created_at` falls in `[start, end]`.
    async fn list_transfers_in_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<MirroredTransfer>, MirrorStoreError>;
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Thread-safe in-memory mirror store.
pub struct InMemoryMirrorStore {
    transfers: RwLock<HashMap<ResourceId, MirroredTransfer>>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self {
            transfers: RwLock::new(HashMap::new()),
        }
    }

    fn locked<T>(
        &self,
        f: impl FnOnce(&mut HashMap<ResourceId, MirroredTransfer>) -> Result<T, MirrorStoreError>,
    ) -> Result<T, MirrorStoreError> {
        let mut map = self
            .transfers
            .write()
            .map_err(|_| MirrorStoreError::OperationFailed {
                message: "mirror store lock poisoned".to_string(),
            })?;
        f(&mut map)
    }
}

impl Default for InMemoryMirrorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn get_transfer(
        &self,
        id: &ResourceId,
    ) -> Result<Option<MirroredTransfer>, MirrorStoreError> {
        let map = self
            .transfers
            .read()
            .map_err(|_| MirrorStoreError::OperationFailed {
                message: "mirror store lock poisoned".to_string(),
            })?;
        Ok(map.get(id).cloned())
    }

    async fn upsert_transfer(&self, transfer: MirroredTransfer) -> Result<(), MirrorStoreError> {
        self.locked(|map| {
            map.insert(transfer.id.clone(), transfer);
            Ok(())
        })
    }

    async fn apply_status(
        &self,
        id: &ResourceId,
        status: TransferStatus,
        return_code: Option<&str>,
    ) -> Result<MirroredTransfer, MirrorStoreError> {
        self.locked(|map| {
            let transfer = map
                .entry(id.clone())
                .or_insert_with(|| MirroredTransfer::new(id.clone(), "0.00", "USD"));

            transfer.status = status;
            transfer.updated_at = Timestamp::now();

            match status {
                TransferStatus::Completed => {
                    transfer.processed_at = Some(Timestamp::now());
                }
                TransferStatus::Returned => {
                    if let Some(code) = return_code {
                        transfer.return_code = Some(code.to_string());
                        transfer.failure_reason = Some(ach_return_reason(code));
                    }
                }
                TransferStatus::Failed | TransferStatus::Cancelled | TransferStatus::Reclaimed => {
                    if transfer.failure_reason.is_none() {
                        transfer.failure_reason =
                            Some(format!("Transfer {}", status.as_str()));
                    }
                }
                TransferStatus::Created | TransferStatus::Pending => {}
            }

            Ok(transfer.clone())
        })
    }

    async fn append_webhook_history(
        &self,
        id: &ResourceId,
        entry: WebhookHistoryEntry,
    ) -> Result<(), MirrorStoreError> {
        self.locked(|map| {
            let transfer = map
                .entry(id.clone())
                .or_insert_with(|| MirroredTransfer::new(id.clone(), "0.00", "USD"));
            transfer.webhook_history.push(entry);
            transfer.updated_at = Timestamp::now();
            Ok(())
        })
    }

    async fn list_transfers_in_window(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<MirroredTransfer>, MirrorStoreError> {
        let map = self
            .transfers
            .read()
            .map_err(|_| MirrorStoreError::OperationFailed {
                message: "mirror store lock poisoned".to_string(),
            })?;

        let mut transfers: Vec<_> = map
            .values()
            .filter(|t| t.created_at >= start && t.created_at <= end)
            .cloned()
            .collect();
        transfers.sort_by_key(|t| t.created_at);
        Ok(transfers)
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
