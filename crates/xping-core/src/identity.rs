//! Identity Generator (C1).
//!
//! Pure, allocation-only derivation of stable test fingerprints and
//! text hashes. No I/O; thread-safe by construction (no shared state).
//!
//! Grounded on `queue_keeper_core::blob_storage::compute_checksum`'s
//! SHA-256-then-hex shape.

use crate::model::TestIdentity;
use sha2::{Digest, Sha256};

/// A single test invocation parameter, formatted culture-invariantly
/// per spec.md §4.1.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
    Timestamp(crate::Timestamp),
}

impl ParamValue {
    /// Render per the formatting rules in spec.md §4.1: integers
    /// decimal, floats with enough digits to round-trip, booleans as
    /// `"true"`/`"false"`, null as the literal string `"null"`,
    /// strings verbatim, timestamps as ISO-8601 UTC.
    fn format(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format!("{:?}", v), // Rust's Debug format for f64 round-trips.
            Self::Bool(v) => v.to_string(),
            Self::Null => "null".to_string(),
            Self::Str(v) => v.clone(),
            Self::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

/// Compute the hex-encoded SHA-256 digest of `text`.
fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Join formatted parameters with `|`, matching spec.md §8 scenario 1
/// (`"2|3"` for params `[2, 3]`).
fn canonical_join(params: &[ParamValue]) -> String {
    params
        .iter()
        .map(ParamValue::format)
        .collect::<Vec<_>>()
        .join("|")
}

/// Derive a [`TestIdentity`] for a test, per spec.md §4.1.
///
/// `fingerprint = hex(SHA256(fqn || "|" || assembly || ("|" ||
/// parameterHash)?))`; `parameterHash` is present only when `params` is
/// non-empty.
pub fn generate(
    fully_qualified_name: &str,
    assembly: &str,
    params: &[ParamValue],
    display_name: &str,
) -> TestIdentity {
    let parameter_hash = if params.is_empty() {
        None
    } else {
        Some(sha256_hex(&canonical_join(params)))
    };

    let mut fingerprint_input = format!("{}|{}", fully_qualified_name, assembly);
    if let Some(ph) = &parameter_hash {
        fingerprint_input.push('|');
        fingerprint_input.push_str(ph);
    }

    TestIdentity {
        fingerprint: sha256_hex(&fingerprint_input),
        fully_qualified_name: fully_qualified_name.to_string(),
        assembly: assembly.to_string(),
        namespace: None,
        class_name: None,
        method_name: None,
        display_name: display_name.to_string(),
        parameter_hash,
        source_file: None,
        source_line: None,
    }
}

/// Hash an error message, trimmed; `None` for empty/whitespace-only text.
pub fn generate_error_message_hash(text: &str) -> Option<String> {
    hash_trimmed(text)
}

/// Hash a stack trace, trimmed; `None` for empty/whitespace-only text.
pub fn generate_stack_trace_hash(text: &str) -> Option<String> {
    hash_trimmed(text)
}

fn hash_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(sha256_hex(trimmed))
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
