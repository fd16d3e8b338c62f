//! # Xping Uploader (C6)
//!
//! HTTP delivery of sessions and batches: retrying exponential-backoff
//! POSTs behind a rolling-window circuit breaker, matching
//! `queue_keeper_core::adapters::circuit_breaker_key_vault::CircuitBreakerKeyVaultProvider`'s
//! shape of wrapping a single upstream call in
//! `breaker.call(|| ...)` and mapping every `CircuitBreakerError`
//! variant onto the crate's own error taxonomy.

mod network_probe;
mod retry;

pub use network_probe::ReqwestNetworkProbe;
pub use retry::{classify_status, parse_retry_after, RetryClassification, RetryPolicy};

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use xping_core::model::{TestExecution, TestSession};
use xping_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, DefaultCircuitBreaker};
use xping_core::uploader::{UploadResult, Uploader};
use xping_core::SessionId;

/// Error taxonomy for a single upload attempt (spec.md §7). Only ever
/// surfaced internally to this crate — the public `Uploader` contract
/// reports outcomes as [`UploadResult`], never by propagating an error.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("rate limited: HTTP 429")]
    RateLimited,

    #[error("client error: HTTP {0}")]
    ClientError(u16),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    fn from_circuit_breaker(error: CircuitBreakerError<UploadError>) -> Self {
        match error {
            CircuitBreakerError::Open => Self::CircuitOpen,
            CircuitBreakerError::Inner(inner) => inner,
        }
    }
}

/// Endpoint and transport settings for [`HttpUploader`] (a projection
/// of the full SDK configuration).
#[derive(Debug, Clone)]
pub struct HttpUploaderConfig {
    pub api_endpoint: url::Url,
    pub api_key: String,
    pub project_id: String,
    pub upload_timeout: Duration,
    pub enable_compression: bool,
    pub retry_policy: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

/// `reqwest`-backed [`Uploader`] implementation.
pub struct HttpUploader {
    client: reqwest::Client,
    config: HttpUploaderConfig,
    breaker: DefaultCircuitBreaker,
    uploaded_sessions: Mutex<HashSet<SessionId>>,
}

impl HttpUploader {
    /// Build the uploader's `reqwest::Client` and state. Fails only if
    /// the underlying TLS/connector setup fails — not part of the
    /// `XpingError` surface since it is a host-environment problem,
    /// not a config-shape problem.
    pub fn new(config: HttpUploaderConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.upload_timeout)
            .user_agent(format!("Xping-SDK/{}", env!("CARGO_PKG_VERSION")));
        if !config.enable_compression {
            builder = builder.no_gzip();
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            breaker: DefaultCircuitBreaker::new(config.circuit_breaker.clone()),
            config,
            uploaded_sessions: Mutex::new(HashSet::new()),
        })
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "X-API-Key",
            reqwest::header::HeaderValue::from_str(&self.config.api_key).unwrap_or_else(|_| {
                reqwest::header::HeaderValue::from_static("")
            }),
        );
        headers.insert(
            "X-Project-Id",
            reqwest::header::HeaderValue::from_str(&self.config.project_id).unwrap_or_else(|_| {
                reqwest::header::HeaderValue::from_static("")
            }),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers
    }

    /// POST `body` to the configured endpoint, retrying per
    /// `retry_policy`, itself wrapped in the circuit breaker.
    async fn post_with_retry(&self, body: serde_json::Value) -> Result<serde_json::Value, UploadError> {
        let result = self
            .breaker
            .call(|| self.post_attempts(body))
            .await;
        result.map_err(UploadError::from_circuit_breaker)
    }

    async fn post_attempts(&self, body: serde_json::Value) -> Result<serde_json::Value, UploadError> {
        let mut attempt = 0u32;
        loop {
            match self.post_once(&body).await {
                Ok(value) => return Ok(value),
                Err((error, retry_after)) => {
                    let retriable = matches!(
                        error,
                        UploadError::Transport(_) | UploadError::ServerError(_) | UploadError::RateLimited
                    );
                    if !retriable || !self.config.retry_policy.should_retry(attempt) {
                        return Err(error);
                    }
                    let delay = self.config.retry_policy.delay_for(attempt, retry_after);
                    warn!(attempt, ?delay, "retrying upload after failure: {error}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<serde_json::Value, (UploadError, Option<Duration>)> {
        let response = self
            .client
            .post(self.config.api_endpoint.clone())
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    (UploadError::Transport("request timed out".to_string()), None)
                } else {
                    (UploadError::Transport(e.to_string()), None)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let json = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            return Ok(json);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let error = map_status_error(status);
        Err((error, retry_after))
    }
}

fn map_status_error(status: StatusCode) -> UploadError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        UploadError::RateLimited
    } else if status.is_server_error() {
        UploadError::ServerError(status.as_u16())
    } else {
        UploadError::ClientError(status.as_u16())
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload_session(&self, session: &TestSession) -> UploadResult {
        {
            let uploaded = self.uploaded_sessions.lock().expect("uploaded_sessions mutex poisoned");
            if uploaded.contains(&session.session_id) {
                return UploadResult::success(0, None);
            }
        }

        let body = xping_core::wire::encode_session(session);
        match self.post_with_retry(body).await {
            Ok(receipt) => {
                let mut uploaded = self.uploaded_sessions.lock().expect("uploaded_sessions mutex poisoned");
                uploaded.insert(session.session_id);
                let receipt_id = receipt
                    .get("receiptId")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                UploadResult::success(0, receipt_id)
            }
            Err(error) => {
                debug!("session upload failed: {error}");
                UploadResult::failure(0, error.to_string())
            }
        }
    }

    async fn upload_batch(&self, session: &TestSession, executions: &[TestExecution]) -> UploadResult {
        let batch = xping_core::wire::optimize_batch_for_transport(session, executions.to_vec());
        let body = xping_core::wire::encode_batch(&batch);

        match self.post_with_retry(body).await {
            Ok(receipt) => {
                let receipt_id = receipt
                    .get("receiptId")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                UploadResult::success(executions.len() as u64, receipt_id)
            }
            Err(error) => {
                debug!("batch upload failed: {error}");
                UploadResult::failure(executions.len() as u64, error.to_string())
            }
        }
    }

    async fn close(&self) {
        // `reqwest::Client` pools connections internally; nothing to
        // release explicitly, matching the teacher's
        // fire-and-forget client lifetime.
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
