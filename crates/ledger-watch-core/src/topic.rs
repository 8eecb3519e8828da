//! Typed provider event topics.
//!
//! Webhook routing is a closed set of known topics plus an explicit
//! `Unknown` variant. Unknown topics are acknowledged and ignored rather
//! than treated as errors, so a provider rolling out new topics cannot
//! break intake.

use crate::ResourceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic string of a provider webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventTopic {
    // Transfer lifecycle
    TransferCreated,
    TransferPending,
    TransferCompleted,
    TransferFailed,
    TransferCancelled,
    TransferReturned,
    TransferReclaimed,

    // Customer verification lifecycle
    CustomerCreated,
    CustomerVerificationDocumentNeeded,
    CustomerVerificationDocumentUploaded,
    CustomerVerified,
    CustomerSuspended,

    // Micro-deposit verification lifecycle
    MicrodepositsAdded,
    MicrodepositsCompleted,
    MicrodepositsFailed,

    /// A topic this service does not route; kept verbatim for audit.
    Unknown(String),
}

impl EventTopic {
    /// Parse a topic string. Never fails: unrecognized values become
    /// [`EventTopic::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s {
            "transfer_created" => Self::TransferCreated,
            "transfer_pending" => Self::TransferPending,
            "transfer_completed" => Self::TransferCompleted,
            "transfer_failed" => Self::TransferFailed,
            "transfer_cancelled" => Self::TransferCancelled,
            "transfer_returned" => Self::TransferReturned,
            "transfer_reclaimed" => Self::TransferReclaimed,
            "customer_created" => Self::CustomerCreated,
            "customer_verification_document_needed" => Self::CustomerVerificationDocumentNeeded,
            "customer_verification_document_uploaded" => Self::CustomerVerificationDocumentUploaded,
            "customer_verified" => Self::CustomerVerified,
            "customer_suspended" => Self::CustomerSuspended,
            "microdeposits_added" => Self::MicrodepositsAdded,
            "microdeposits_completed" => Self::MicrodepositsCompleted,
            "microdeposits_failed" => Self::MicrodepositsFailed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Get the wire-format topic string
    pub fn as_str(&self) -> &str {
        match self {
            Self::TransferCreated => "transfer_created",
            Self::TransferPending => "transfer_pending",
            Self::TransferCompleted => "transfer_completed",
            Self::TransferFailed => "transfer_failed",
            Self::TransferCancelled => "transfer_cancelled",
            Self::TransferReturned => "transfer_returned",
            Self::TransferReclaimed => "transfer_reclaimed",
            Self::CustomerCreated => "customer_created",
            Self::CustomerVerificationDocumentNeeded => "customer_verification_document_needed",
            Self::CustomerVerificationDocumentUploaded => "customer_verification_document_uploaded",
            Self::CustomerVerified => "customer_verified",
            Self::CustomerSuspended => "customer_suspended",
            Self::MicrodepositsAdded => "microdeposits_added",
            Self::MicrodepositsCompleted => "microdeposits_completed",
            Self::MicrodepositsFailed => "microdeposits_failed",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Kind of mirrored resource this topic refers to.
    ///
    /// `None` for unknown topics, which have nothing to mutate or track.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            Self::TransferCreated
            | Self::TransferPending
            | Self::TransferCompleted
            | Self::TransferFailed
            | Self::TransferCancelled
            | Self::TransferReturned
            | Self::TransferReclaimed => Some(ResourceType::Transfer),
            Self::CustomerCreated
            | Self::CustomerVerificationDocumentNeeded
            | Self::CustomerVerificationDocumentUploaded
            | Self::CustomerVerified
            | Self::CustomerSuspended
            | Self::MicrodepositsAdded
            | Self::MicrodepositsCompleted
            | Self::MicrodepositsFailed => Some(ResourceType::Customer),
            Self::Unknown(_) => None,
        }
    }

    /// True when the topic is routed by this service
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for EventTopic {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EventTopic> for String {
    fn from(value: EventTopic) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
