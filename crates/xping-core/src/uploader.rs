//! Uploader contract (C6).
//!
//! Declared here so the Collector can depend on an abstract uploader
//! without pulling in an HTTP client; `xping-uploader` provides the
//! `reqwest`-backed implementation. Mirrors
//! `queue_keeper_core::queue_integration::EventRouter` — a narrow
//! trait in the domain crate, a concrete adapter elsewhere.

use crate::model::{TestExecution, TestSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of an upload attempt, reported to the Collector rather than
/// raised as an error (spec.md §7: "nothing in the core fails a test
/// because of SDK failure").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub execution_count: u64,
}

impl UploadResult {
    /// A successful result for `execution_count` executions (or 0 for
    /// session-only uploads).
    pub fn success(execution_count: u64, receipt_id: Option<String>) -> Self {
        Self {
            success: true,
            status_code: Some(200),
            receipt_id,
            error_message: None,
            execution_count,
        }
    }

    /// A failure result carrying the reason, for display/logging.
    pub fn failure(execution_count: u64, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            receipt_id: None,
            error_message: Some(error_message.into()),
            execution_count,
        }
    }
}

/// Uploads sessions and batches to the ingest endpoint.
///
/// `upload_session` must be idempotent per `sessionId`: subsequent
/// calls for an already-uploaded session return success without
/// network I/O.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the session header, exactly once per `sessionId`.
    async fn upload_session(&self, session: &TestSession) -> UploadResult;

    /// Upload a batch of executions for `session`. Always invoked
    /// after `upload_session` for the same session.
    async fn upload_batch(&self, session: &TestSession, executions: &[TestExecution]) -> UploadResult;

    /// Release any held resources (connection pools, background
    /// tasks). Idempotent.
    async fn close(&self);
}

#[cfg(test)]
#[path = "uploader_tests.rs"]
mod tests;
