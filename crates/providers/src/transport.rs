//! HTTP transport: the production [`ChatTransport`] on top of `reqwest`.

use async_trait::async_trait;
use parley_core::{ChatTransport, Error, ProviderError, TransportRequest};
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Sends JSON POSTs with a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with a per-request timeout.
    ///
    /// Client construction failures (e.g. TLS backend initialization) surface
    /// as [`Error::Application`].
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::application)?;
        Ok(Self { client })
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post_json(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        debug!(url = %request.url, "POST");

        let mut builder = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after_secs(response.headers()),
            });
        }

        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(if body.is_empty() {
                "Invalid API key or insufficient permissions".into()
            } else {
                body
            }));
        }

        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))
    }
}
