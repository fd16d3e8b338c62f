//! Retry Detector (C4).
//!
//! Framework-agnostic recognition of retried test attempts. Test
//! frameworks surface retries differently — some via a documented
//! attribute/annotation name, some only by mangling the display name
//! (`"MyTest (attempt 2)"`, `"MyTest [Retry 2/3]"`). This module
//! recognizes both without depending on any specific framework's SDK,
//! mirroring how `github_bot_sdk::client::retry` and
//! `queue_keeper_service::retry` both recognize retry-after/backoff
//! hints without the caller coupling to a single source.

use crate::model::RetryMetadata;
use crate::Outcome;
use once_lock_regex::StaticRegex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::time::Duration;

/// Retry-related attribute/annotation names recognized by name across
/// common .NET and JVM test frameworks. Matching is case-insensitive.
const KNOWN_RETRY_ATTRIBUTE_NAMES: &[&str] = &[
    "Retry",
    "RetryFact",
    "RetryTheory",
    "FlakyTest",
    "RetryOnFailure",
    "Repeat",
];

mod once_lock_regex {
    use regex::Regex;
    use std::sync::OnceLock;

    /// A regex compiled exactly once, lazily, on first use.
    pub struct StaticRegex {
        pattern: &'static str,
        cell: OnceLock<Regex>,
    }

    impl StaticRegex {
        pub const fn new(pattern: &'static str) -> Self {
            Self {
                pattern,
                cell: OnceLock::new(),
            }
        }

        pub fn get(&self) -> &Regex {
            self.cell
                .get_or_init(|| Regex::new(self.pattern).expect("static retry pattern is valid"))
        }
    }
}

/// Matches `"(attempt 2)"`, `"(attempt 2 of 3)"`, case-insensitively.
static ATTEMPT_PATTERN: StaticRegex =
    StaticRegex::new(r"(?i)\(attempt\s+(\d+)(?:\s+of\s+(\d+))?\)");

/// Matches `"[Retry 2/3]"`, `"[Retry 2]"`, case-insensitively.
static RETRY_BRACKET_PATTERN: StaticRegex = StaticRegex::new(r"(?i)\[retry\s+(\d+)(?:/(\d+))?\]");

/// Parsed retry position extracted from a display name or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPosition {
    pub attempt_number: u32,
    pub max_retries: Option<u32>,
}

/// Attempt to recognize a known retry attribute by name (case-insensitive).
pub fn is_known_retry_attribute(name: &str) -> bool {
    KNOWN_RETRY_ATTRIBUTE_NAMES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
}

/// Parse a retry position out of a test's display name, trying the
/// `(attempt N [of M])` form first, then the `[Retry N[/M]]` form.
/// Returns `None` when neither pattern matches — the common case for
/// first-attempt, non-retried tests.
pub fn detect_from_display_name(display_name: &str) -> Option<RetryPosition> {
    if let Some(caps) = ATTEMPT_PATTERN.get().captures(display_name) {
        let attempt_number: u32 = caps.get(1)?.as_str().parse().ok()?;
        let max_retries = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return Some(RetryPosition {
            attempt_number,
            max_retries,
        });
    }
    if let Some(caps) = RETRY_BRACKET_PATTERN.get().captures(display_name) {
        let attempt_number: u32 = caps.get(1)?.as_str().parse().ok()?;
        let max_retries = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return Some(RetryPosition {
            attempt_number,
            max_retries,
        });
    }
    None
}

/// The handful of properties the retry contract needs out of a host
/// framework's own test descriptor, so this crate never couples to any
/// one framework's SDK. A framework adapter implements this directly
/// on (or alongside) whatever descriptor type it already has.
pub trait RetryDescriptor {
    /// The test's display name, used for the `(attempt N)`/`[retry N]`
    /// fallback patterns when the framework exposes no attempt counter
    /// of its own.
    fn display_name(&self) -> &str;

    /// A retry attribute/annotation name the framework's own
    /// reflection surface found on the test, if any.
    fn retry_attribute_name(&self) -> Option<&str>;

    /// An attempt counter the framework tracks itself, if any.
    fn attempt_number(&self) -> Option<u32>;

    /// A max-retries bound the framework tracks itself, if any.
    fn max_retries(&self) -> Option<u32>;

    /// Delay observed between this attempt and the previous one.
    fn delay_between_retries(&self) -> Duration;

    /// Free-form reason the framework gives for the retry, if any.
    fn retry_reason(&self) -> Option<String>;
}

/// Framework-generic retry-metadata contract (spec.md §4.4):
/// `detect(descriptor, fingerprint, outcome) -> RetryMetadata?`,
/// parametric over the host's descriptor type, mirroring
/// `EventRouter`/`KeyVaultProvider`'s trait-per-capability style.
pub trait DetectRetryMetadata<D: RetryDescriptor> {
    /// Returns `None` when `descriptor` carries no recognized retry
    /// signal (no known attribute, no attempt counter, no matching
    /// display-name pattern) — the common case for a first, non-retried
    /// attempt.
    fn detect(&self, descriptor: &D, fingerprint: &str, outcome: Outcome) -> Option<RetryMetadata>;
}

/// The default [`DetectRetryMetadata`] implementation: attribute-name
/// registry lookup plus display-name pattern matching plus
/// [`RetrySequenceTracker`] for `maxRetries` reporting when only the
/// final attempt carries it. Generic over `D` so one instance serves
/// any framework's descriptor type; no concrete framework descriptor
/// ships in this crate (out of scope — an adapter crate supplies one).
pub struct RetryDetector<D> {
    sequence: RetrySequenceTracker,
    _descriptor: PhantomData<fn(&D)>,
}

impl<D> RetryDetector<D> {
    pub fn new() -> Self {
        Self {
            sequence: RetrySequenceTracker::new(),
            _descriptor: PhantomData,
        }
    }
}

impl<D> Default for RetryDetector<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RetryDescriptor> DetectRetryMetadata<D> for RetryDetector<D> {
    fn detect(&self, descriptor: &D, fingerprint: &str, outcome: Outcome) -> Option<RetryMetadata> {
        let parsed = detect_from_display_name(descriptor.display_name());
        let known_attribute = descriptor
            .retry_attribute_name()
            .filter(|name| is_known_retry_attribute(name));

        // Attempt number: (a) descriptor's own counter, (b) display-name
        // pattern, (c) default 1 (spec.md §4.4).
        let attempt_number = descriptor
            .attempt_number()
            .or_else(|| parsed.map(|p| p.attempt_number))
            .unwrap_or(1);

        let has_retry_signal =
            descriptor.attempt_number().is_some() || parsed.is_some() || known_attribute.is_some();
        if !has_retry_signal {
            return None;
        }

        let observed_max = self.sequence.observe(fingerprint, attempt_number);
        let max_retries = descriptor
            .max_retries()
            .or_else(|| parsed.and_then(|p| p.max_retries))
            .unwrap_or(observed_max.saturating_sub(1).max(attempt_number.saturating_sub(1)));

        Some(RetryMetadata::new(
            attempt_number,
            max_retries,
            outcome,
            descriptor.delay_between_retries(),
            descriptor.retry_reason(),
            known_attribute.or_else(|| descriptor.retry_attribute_name()).unwrap_or("").to_string(),
        ))
    }
}

/// Tracks the highest attempt number seen per test fingerprint, so
/// that `maxRetries` can be reported even when only the final attempt
/// carries the framework's own retry count (or none does).
pub struct RetrySequenceTracker {
    seen: Mutex<HashMap<String, u32>>,
}

impl RetrySequenceTracker {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record an observed attempt number for `fingerprint`, returning
    /// the highest attempt number seen so far (including this one).
    pub fn observe(&self, fingerprint: &str, attempt_number: u32) -> u32 {
        let mut seen = self.seen.lock().expect("retry tracker mutex poisoned");
        let entry = seen.entry(fingerprint.to_string()).or_insert(0);
        *entry = (*entry).max(attempt_number);
        *entry
    }
}

impl Default for RetrySequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "retry_detector_tests.rs"]
mod tests;
