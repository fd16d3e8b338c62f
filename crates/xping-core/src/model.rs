//! Data model types (spec.md §3): test identity, metadata, retry
//! metadata, orchestration records, executions, environment info, and
//! sessions.

use crate::{ExecutionId, Outcome, SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Test Identity
// ============================================================================

/// Immutable identity of a test, stable across runs and across retried
/// attempts of the same (possibly parameterized) test.
///
/// See [`crate::identity`] for how `fingerprint`/`parameter_hash` are
/// derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestIdentity {
    pub fingerprint: String,
    pub fully_qualified_name: String,
    pub assembly: String,
    pub namespace: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub display_name: String,
    pub parameter_hash: Option<String>,
    pub source_file: Option<String>,
    pub source_line: Option<u32>,
}

// ============================================================================
// Test Metadata
// ============================================================================

/// Free-form test metadata: categories, tags, and custom attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Last-write-wins custom attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_attributes: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestMetadata {
    /// Insert or overwrite a custom attribute (last-write-wins).
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom_attributes.insert(key.into(), value.into());
    }
}

// ============================================================================
// Retry Metadata
// ============================================================================

/// Retry state attached to a retried execution.
///
/// Invariant: if `attempt_number == 1`, `passed_on_retry` is always
/// `false` regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryMetadata {
    pub attempt_number: u32,
    pub max_retries: u32,
    pub passed_on_retry: bool,

    #[serde(with = "duration_millis")]
    pub delay_between_retries: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_reason: Option<String>,

    pub retry_attribute_name: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_metadata: HashMap<String, String>,
}

impl RetryMetadata {
    /// Build retry metadata honoring the `attempt==1 => !passed_on_retry`
    /// invariant regardless of what the caller passes for `outcome`.
    pub fn new(
        attempt_number: u32,
        max_retries: u32,
        outcome: Outcome,
        delay_between_retries: Duration,
        retry_reason: Option<String>,
        retry_attribute_name: impl Into<String>,
    ) -> Self {
        let passed_on_retry = attempt_number > 1 && matches!(outcome, Outcome::Passed);
        Self {
            attempt_number,
            max_retries,
            passed_on_retry,
            delay_between_retries,
            retry_reason,
            retry_attribute_name: retry_attribute_name.into(),
            additional_metadata: HashMap::new(),
        }
    }
}

// ============================================================================
// Orchestration Record
// ============================================================================

/// Per-execution orchestration fields produced by the Execution
/// Tracker (C3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRecord {
    pub position_in_suite: u64,
    pub global_position: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_test_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_test_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_test_outcome: Option<Outcome>,

    pub was_parallelized: bool,
    pub concurrent_test_count: u32,
    pub thread_id: String,
    pub worker_id: String,

    #[serde(with = "duration_millis")]
    pub suite_elapsed_time: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

// ============================================================================
// Test Execution
// ============================================================================

/// One test execution (including one retry attempt).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    pub execution_id: ExecutionId,
    pub identity: TestIdentity,
    pub test_name: String,
    pub outcome: Outcome,

    #[serde(with = "duration_millis")]
    pub duration: Duration,

    pub start_time_utc: Timestamp,
    pub end_time_utc: Timestamp,

    #[serde(default)]
    pub metadata: TestMetadata,

    pub orchestration: OrchestrationRecord,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryMetadata>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace_hash: Option<String>,
}

// ============================================================================
// Environment Info
// ============================================================================

/// Network reachability metrics, gated by `collectNetworkMetrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub latency_ms: Option<f64>,
    pub online: bool,
    pub connection_type: Option<String>,
    pub packet_loss_percent: Option<f64>,
}

/// Per-process environment fingerprint, built lazily and cached for
/// the process lifetime (spec.md §3 "Environment Info").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub machine_name: String,
    pub operating_system: String,
    pub runtime_version: String,
    pub framework: String,
    pub environment_name: String,
    pub is_ci_environment: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_metrics: Option<NetworkMetrics>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_properties: HashMap<String, String>,
}

// ============================================================================
// Test Session
// ============================================================================

/// One SDK process lifetime of test activity, carrying one environment
/// fingerprint. Uploaded at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    pub session_id: SessionId,
    pub started_at: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,

    pub environment_info: EnvironmentInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tests_expected: Option<u64>,
}

impl TestSession {
    /// Create a new session, environment already resolved.
    pub fn new(environment_info: EnvironmentInfo) -> Self {
        Self {
            session_id: SessionId::new(),
            started_at: Timestamp::now(),
            completed_at: None,
            environment_info,
            total_tests_expected: None,
        }
    }
}

/// (De)serialize a [`Duration`] as whole milliseconds, per spec.md §4.8
/// ("choice is fixed per field").
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
