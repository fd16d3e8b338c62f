//! Serialization (C8).
//!
//! Compact camelCase JSON wire contract with a batch-level payload
//! optimization: the session context is attached to the first
//! execution of a batch only, and rehydrated onto the rest on decode.
//! Field-level `skip_serializing_if` mirrors
//! `queue_keeper_api::config::ProviderSecretConfig`'s approach of
//! omitting defaulted/absent fields from the encoded form.

use crate::model::{TestExecution, TestSession};
use crate::{ParseError, SessionId};
use serde::{Deserialize, Serialize};

/// One execution as it appears on the wire inside a batch: the session
/// context is `Some` only for the first element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireExecution {
    #[serde(flatten)]
    pub execution: TestExecution,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<TestSession>,
}

/// A batch as transmitted over the wire: up to `batchSize` executions,
/// session-optimized per spec.md §4.8, plus the top-level `sessionId`
/// spec.md §6's batch envelope requires independent of the per-element
/// optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBatch {
    pub session_id: SessionId,
    pub executions: Vec<WireExecution>,
}

/// Encode a session and a fresh batch of executions, attaching the
/// full session context to the first execution only. An empty
/// `executions` yields an empty batch.
pub fn optimize_batch_for_transport(session: &TestSession, executions: Vec<TestExecution>) -> WireBatch {
    let mut wire_executions = Vec::with_capacity(executions.len());
    for (index, execution) in executions.into_iter().enumerate() {
        wire_executions.push(WireExecution {
            execution,
            session: if index == 0 {
                Some(session.clone())
            } else {
                None
            },
        });
    }
    WireBatch {
        session_id: session.session_id,
        executions: wire_executions,
    }
}

/// Rehydrate a decoded batch in place: copy the first element's
/// session onto every element whose session is `None`.
///
/// `OptimizeBatchForTransport ∘ Rehydrate = identity` on the session
/// reference (spec.md §8).
pub fn rehydrate(batch: &mut WireBatch) {
    let Some(session) = batch.executions.first().and_then(|e| e.session.clone()) else {
        return;
    };
    for wire_execution in batch.executions.iter_mut() {
        if wire_execution.session.is_none() {
            wire_execution.session = Some(session.clone());
        }
    }
}

/// Encode a [`TestSession`] as compact camelCase JSON.
pub fn encode_session(session: &TestSession) -> serde_json::Value {
    serde_json::to_value(session).expect("TestSession serialization is infallible")
}

/// Decode a session from JSON, ignoring unknown fields.
pub fn decode_session(json: &serde_json::Value) -> Result<TestSession, ParseError> {
    serde_json::from_value(json.clone()).map_err(|e| ParseError::InvalidFormat {
        expected: "TestSession JSON".to_string(),
        actual: e.to_string(),
    })
}

/// Encode a batch as compact camelCase JSON, session-optimized.
pub fn encode_batch(batch: &WireBatch) -> serde_json::Value {
    serde_json::to_value(batch).expect("WireBatch serialization is infallible")
}

/// Decode a batch from JSON and rehydrate the session reference onto
/// every execution.
pub fn decode_batch(json: &serde_json::Value) -> Result<WireBatch, ParseError> {
    let mut batch: WireBatch =
        serde_json::from_value(json.clone()).map_err(|e| ParseError::InvalidFormat {
            expected: "WireBatch JSON".to_string(),
            actual: e.to_string(),
        })?;
    rehydrate(&mut batch);
    Ok(batch)
}

/// An upload receipt decoded from the server's response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub receipt_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    #[serde(default)]
    pub accepted_count: u64,
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
