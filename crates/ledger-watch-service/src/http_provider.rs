//! Production [`ProviderClient`] implementation over the provider's REST API.
//!
//! Maps provider HTTP semantics onto the reconciliation engine's contract:
//! a 404 means the resource does not exist (a reconciliation finding, not a
//! failure), 429 is the provider pushing back, and connection-level errors
//! are transient.

use async_trait::async_trait;
use ledger_watch_core::{
    ProviderClient, ProviderError, ProviderTransfer, ResourceId, Timestamp,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Wire shape of a provider transfer record.
#[derive(Debug, Deserialize)]
struct ApiTransfer {
    id: String,
    status: String,
    amount: ApiAmount,
    created: String,
}

#[derive(Debug, Deserialize)]
struct ApiAmount {
    value: String,
    currency: String,
}

/// HTTP-backed provider client.
pub struct HttpProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderClient {
    /// Build a client against `base_url`, sending `api_token` as a bearer
    /// token when non-empty.
    pub fn new(
        base_url: impl Into<String>,
        api_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if !api_token.is_empty() {
            let value = format!("Bearer {}", api_token)
                .parse()
                .map_err(|_| ProviderError::RequestFailed {
                    message: "api token is not a valid header value".to_string(),
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::RequestFailed {
                message: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip(self), fields(transfer_id = %id))]
    async fn fetch_transfer(
        &self,
        id: &ResourceId,
    ) -> Result<Option<ProviderTransfer>, ProviderError> {
        let url = format!("{}/transfers/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                message: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => {
                let record: ApiTransfer =
                    response
                        .json()
                        .await
                        .map_err(|e| ProviderError::RequestFailed {
                            message: format!("malformed provider response: {}", e),
                        })?;

                debug!(status = %record.status, "Fetched provider transfer");
                Ok(Some(ProviderTransfer {
                    id: ResourceId::new(record.id).map_err(|e| {
                        ProviderError::RequestFailed {
                            message: format!("provider returned an invalid id: {}", e),
                        }
                    })?,
                    status: record.status,
                    amount: record.amount.value,
                    currency: record.amount.currency,
                    created_at: Timestamp::from_rfc3339(&record.created).unwrap_or_else(|_| {
                        Timestamp::now()
                    }),
                }))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if status.is_server_error() => Err(ProviderError::RequestFailed {
                message: format!("provider returned {}", status),
            }),
            status => Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: format!("provider rejected the request with {}", status),
            }),
        }
    }
}

#[cfg(test)]
#[path = "http_provider_tests.rs"]
mod tests;
