//! Resilience primitives shared by the uploader.
//!
//! Grounded on `queue_keeper_core::circuit_breaker`'s trait/state-enum
//! split: a narrow async trait callers depend on, a concrete
//! `DefaultCircuitBreaker` guarding a rolling window behind a
//! `tokio::sync::RwLock`, matching that module's
//! `Arc<RwLock<InternalState>>` composition.

mod breaker;

pub use breaker::{CircuitMetrics, DefaultCircuitBreaker};

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Circuit breaker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through normally; failures accumulate in the window.
    Closed,
    /// Calls fail fast; after the break duration elapses, the next
    /// call transitions to `HalfOpen`.
    Open,
    /// A bounded number of probe calls are allowed through to decide
    /// whether to close or re-open.
    HalfOpen,
}

/// Configuration for the rolling-window failure-ratio breaker
/// (spec.md §4.6): open when the failure ratio reaches
/// `failure_ratio_threshold` over at least `minimum_samples`
/// observations, stay open for `open_duration`, then allow
/// `half_open_max_requests` probes.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub minimum_samples: u32,
    pub failure_ratio_threshold: f64,
    pub open_duration: Duration,
    pub half_open_max_requests: u32,
    pub window_size: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            minimum_samples: 10,
            failure_ratio_threshold: 0.5,
            open_duration: Duration::from_secs(30),
            half_open_max_requests: 1,
            window_size: 20,
        }
    }
}

/// Error wrapper returned by [`CircuitBreaker::call`]: either the
/// breaker rejected the call outright, or the guarded operation itself
/// failed.
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without being attempted.
    Open,
    /// The guarded operation ran and failed with `E`.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "circuit breaker is open"),
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CircuitBreakerError<E> {}

/// A circuit breaker guarding calls that can fail with `E`.
#[async_trait]
pub trait CircuitBreaker<E>: Send + Sync {
    /// Run `operation` through the breaker: rejected immediately with
    /// [`CircuitBreakerError::Open`] while open; otherwise run it and
    /// record the outcome.
    async fn call<F, Fut, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send;

    /// Current breaker state, for diagnostics/logging.
    async fn state(&self) -> CircuitState;
}
