//! Submission of encoded payloads to the decoding service.
//!
//! The service accepts `POST <base>/encode` with a [`SafePayload`] body and
//! replies `{"file_path": ...}` on success or `{"detail": ...}` on failure.

use crate::codec::SafePayload;
use crate::defaults::ENCODE_ENDPOINT;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Opaque relative path of the stored result, as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator(String);

impl ResourceLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Retrievable address of the result on the given service.
    pub fn url(&self, base_url: &str) -> String {
        resource_url(base_url, self)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join the service base address and a locator with exactly one slash.
pub fn resource_url(base_url: &str, locator: &ResourceLocator) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        locator.as_str().trim_start_matches('/')
    )
}

/// Trait for handing a payload to the decoding service.
///
/// This trait allows swapping implementations (HTTP vs stub).
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Send one payload.
    ///
    /// # Errors
    /// `Remote` on network failure, a non-success status, or an unparseable
    /// response body.
    async fn submit(&self, payload: &SafePayload) -> Result<ResourceLocator>;
}

#[derive(Deserialize)]
struct SuccessBody {
    file_path: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Interpret the body of a 2xx response.
pub fn parse_success_body(body: &str) -> Result<ResourceLocator> {
    serde_json::from_str::<SuccessBody>(body)
        .map(|parsed| ResourceLocator(parsed.file_path))
        .map_err(|_| RelayError::Remote {
            detail: "malformed success response".to_string(),
        })
}

/// Interpret the body of a non-2xx response.
pub fn parse_error_body(body: &str) -> RelayError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        // Validation errors carry structured detail
        Ok(ErrorBody { detail }) if !detail.is_null() => detail.to_string(),
        _ => return malformed_error_response(),
    };
    RelayError::Remote { detail }
}

fn malformed_error_response() -> RelayError {
    RelayError::Remote {
        detail: "malformed error response".to_string(),
    }
}

/// Submitter talking to the real service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
}

impl HttpSubmitter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Remote {
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let endpoint = format!("{base_url}/{ENCODE_ENDPOINT}");

        Ok(Self {
            client,
            base_url,
            endpoint,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, payload: &SafePayload) -> Result<ResourceLocator> {
        let body = payload.to_json()?;

        tracing::debug!(endpoint = %self.endpoint, bytes = body.len(), "submitting payload");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Remote {
                detail: format!("request to {} failed: {e}", self.endpoint),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "service rejected payload");
            return Err(match response.text().await {
                Ok(text) => parse_error_body(&text),
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read error body");
                    malformed_error_response()
                }
            });
        }

        let text = response.text().await.map_err(|e| RelayError::Remote {
            detail: format!("failed to read response: {e}"),
        })?;

        let locator = parse_success_body(&text)?;
        tracing::info!(locator = %locator, "payload stored");
        Ok(locator)
    }
}

/// Submitter recording payloads instead of sending them.
#[derive(Debug)]
pub struct StubSubmitter {
    outcome: std::result::Result<ResourceLocator, String>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<SafePayload>>,
}

impl StubSubmitter {
    /// Accept every payload and return `file_path`.
    pub fn new(file_path: &str) -> Self {
        Self {
            outcome: Ok(ResourceLocator::new(file_path)),
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Reject every payload with a `Remote` error carrying `detail`.
    pub fn failing(detail: &str) -> Self {
        Self {
            outcome: Err(detail.to_string()),
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<SafePayload> {
        self.payloads
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Submitter for StubSubmitter {
    async fn submit(&self, payload: &SafePayload) -> Result<ResourceLocator> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.payloads.lock() {
            guard.push(payload.clone());
        }
        self.outcome
            .clone()
            .map_err(|detail| RelayError::Remote { detail })
    }
}
