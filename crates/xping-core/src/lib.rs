//! # Xping SDK Core
//!
//! Domain logic for the Xping client-side test telemetry SDK: test
//! identity, environment fingerprinting, execution ordering, the wire
//! contract, and the resilience primitives the uploader is built on.
//!
//! ## Architecture
//!
//! Business logic here depends only on trait abstractions
//! ([`Uploader`], [`resilience::CircuitBreaker`]); the concrete HTTP
//! implementation lives in `xping-uploader` so this crate never pulls
//! in `reqwest`.
//!
//! ## Usage
//!
//! ```rust
//! use xping_core::{ExecutionId, SessionId};
//!
//! let execution_id = ExecutionId::new();
//! let session_id = SessionId::new();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use ulid::Ulid;
pub use uuid::Uuid;

/// Standard result type for Xping SDK operations.
pub type XpingResult<T> = Result<T, XpingError>;

// ============================================================================
// Identifier Types
// ============================================================================

/// Session identifier. One per SDK process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Execution identifier. Unique per record; ULID so that per-process
/// ordering of executions is incidentally lexicographic (useful for
/// log correlation, not relied upon for any invariant in spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Ulid);

impl ExecutionId {
    /// Generate a new unique execution ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation.
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// UTC timestamp, monotonic-adjacent to wall-clock use (spec.md §3
/// says duration is authoritative and derived from a monotonic clock;
/// `Timestamp` itself is the wall-clock projection used for
/// `startTimeUtc`/`endTimeUtc`/wire fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Render as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Underlying `DateTime`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Add whole seconds.
    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds as i64))
    }

    /// Elapsed duration since an earlier timestamp.
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.0
            .signed_duration_since(earlier.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Outcome of a single test execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Inconclusive,
    NotExecuted,
}

impl Outcome {
    /// String form used in display-name retry-pattern matching and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Inconclusive => "inconclusive",
            Self::NotExecuted => "notExecuted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried.
    Transient,
    /// Permanent failures that will not succeed on retry.
    Permanent,
    /// Configuration errors preventing startup.
    Configuration,
}

/// Error type for input validation failures.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' is out of range: {message}")]
    OutOfRange { field: String, message: String },
}

/// Error type for string parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for Xping SDK operations.
///
/// Per spec.md §7, only [`XpingError::ConfigInvalid`] is ever raised to
/// the host; every other failure mode is reported as a structured
/// value (`UploadResult`, `Stats`) rather than via this enum.
#[derive(Debug, thiserror::Error)]
pub enum XpingError {
    #[error("Configuration is invalid: {0}")]
    ConfigInvalid(#[from] ValidationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl XpingError {
    /// Error category for monitoring and alerting.
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::ConfigInvalid(_) => ErrorCategory::Configuration,
            Self::Parse(_) => ErrorCategory::Permanent,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Test identity, metadata, execution, and session data model (§3).
pub mod model;

/// Identity Generator (C1): stable test fingerprints and text hashing.
pub mod identity;

/// Environment Detector (C2): per-process environment fingerprint.
pub mod environment;

/// Execution Tracker (C3): per-worker ordinal positions and linkage.
pub mod tracker;

/// Retry Detector (C4): framework-agnostic retry metadata contract.
pub mod retry_detector;

/// Configuration (§3, §6): recognized options, validation, env binding.
pub mod config;

/// Serialization (C8): wire envelopes and batch payload optimization.
pub mod wire;

/// Resilience primitives shared by the uploader: circuit breaker.
pub mod resilience;

/// Uploader contract consumed by the Collector, implemented by
/// `xping-uploader`.
pub mod uploader;

pub use model::{
    EnvironmentInfo, NetworkMetrics, OrchestrationRecord, RetryMetadata, TestExecution,
    TestIdentity, TestMetadata, TestSession,
};
pub use uploader::{UploadResult, Uploader};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
