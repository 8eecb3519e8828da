//! HTTP error mapping.
//!
//! Route-boundary errors become structured JSON envelopes with the status
//! code the taxonomy assigns:
//!
//! - `401 Unauthorized`: signature verification failure (nothing persisted)
//! - `400 Bad Request`: validation failures, with a field-level error list
//! - `404 Not Found`: unknown run / discrepancy ids
//! - `503 Service Unavailable`: transient dependency failures worth a retry
//! - `500 Internal Server Error`: everything unexpected
//!
//! The envelope shape is `{ "success": false, "error": ..., "details": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use ledger_watch_core::ValidationError;
use serde::Serialize;
use tracing::{error, warn};

/// One field-level validation failure
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&ValidationError> for FieldError {
    fn from(err: &ValidationError) -> Self {
        Self {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

/// Route-boundary error with HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Signature verification failed; the payload was not persisted
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Malformed request; carries a field-level error list
    #[error("Validation failed")]
    Validation { errors: Vec<FieldError> },

    /// Unknown resource id in the request path or query
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Transient dependency failure; the client may retry
    #[error("Service temporarily unavailable: {message}")]
    Unavailable { message: String },

    /// Unexpected failure; details are logged, not returned
    #[error("Internal server error")]
    Internal { message: String },
}

impl ApiError {
    /// Single-field validation error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Validation error for a missing required field
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Validation {
            errors: vec![FieldError {
                message: format!("Field '{}' is required", field),
                field,
            }],
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation {
            errors: vec![FieldError::from(&err)],
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            Self::Authentication { message } => {
                warn!(error = %message, "Rejected unauthenticated webhook");
                (
                    StatusCode::UNAUTHORIZED,
                    "invalid or missing signature".to_string(),
                    None,
                )
            }
            Self::Validation { errors } => (
                StatusCode::BAD_REQUEST,
                "validation failed".to_string(),
                serde_json::to_value(errors).ok(),
            ),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string(), None),
            Self::Unavailable { message } => {
                warn!(error = %message, "Dependency unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), None)
            }
            Self::Internal { message } => {
                // Log the detail server-side; return a generic message
                error!(error = %message, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = serde_json::json!({
            "success": false,
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            if let Ok(value) = "30".parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
