//! Concrete rolling-window circuit breaker.
//!
//! Grounded on `queue_keeper_core::circuit_breaker::breaker::DefaultCircuitBreaker`:
//! same `Arc<RwLock<InternalState>>` shape, same
//! Closed/Open/HalfOpen transition logic, same "the caller's future is
//! only polled when the breaker lets it through" contract. Differs
//! from the teacher in trip condition: spec.md §4.6 requires a rolling
//! failure *ratio* over a minimum sample count rather than N
//! consecutive failures.

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Point-in-time counters for observability.
#[derive(Debug, Clone, Default)]
pub struct CircuitMetrics {
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
    pub current_failure_ratio: f64,
}

struct InternalState {
    circuit_state: CircuitState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    metrics: CircuitMetrics,
}

impl InternalState {
    fn new() -> Self {
        Self {
            circuit_state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            half_open_in_flight: 0,
            metrics: CircuitMetrics::default(),
        }
    }
}

/// Rolling-window, ratio-tripped circuit breaker.
pub struct DefaultCircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<InternalState>,
}

impl DefaultCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(InternalState::new()),
        }
    }

    /// Snapshot of current counters.
    pub async fn metrics(&self) -> CircuitMetrics {
        self.state.read().await.metrics.clone()
    }

    /// Decide, under a write lock, whether a new call may proceed, and
    /// mutate state (e.g. `Open` → `HalfOpen` transition) as a side
    /// effect of that decision.
    async fn admit(&self) -> bool {
        let mut state = self.state.write().await;
        match state.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened_at| opened_at.elapsed())
                    .unwrap_or_default();
                if elapsed >= self.config.open_duration {
                    state.circuit_state = CircuitState::HalfOpen;
                    state.half_open_in_flight = 1;
                    true
                } else {
                    state.metrics.total_rejected += 1;
                    false
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_in_flight < self.config.half_open_max_requests {
                    state.half_open_in_flight += 1;
                    true
                } else {
                    state.metrics.total_rejected += 1;
                    false
                }
            }
        }
    }

    async fn record(&self, success: bool) {
        let mut state = self.state.write().await;
        state.metrics.total_calls += 1;
        if !success {
            state.metrics.total_failures += 1;
        }

        match state.circuit_state {
            CircuitState::HalfOpen => {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                if success {
                    state.circuit_state = CircuitState::Closed;
                    state.window.clear();
                    state.opened_at = None;
                } else {
                    state.circuit_state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    state.window.clear();
                }
            }
            CircuitState::Closed => {
                state.window.push_back(success);
                if state.window.len() > self.config.window_size {
                    state.window.pop_front();
                }

                let samples = state.window.len() as u32;
                if samples >= self.config.minimum_samples {
                    let failures = state.window.iter().filter(|s| !**s).count() as f64;
                    let ratio = failures / samples as f64;
                    state.metrics.current_failure_ratio = ratio;
                    if ratio >= self.config.failure_ratio_threshold {
                        state.circuit_state = CircuitState::Open;
                        state.opened_at = Some(Instant::now());
                        state.window.clear();
                    }
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[async_trait]
impl<E: Send> CircuitBreaker<E> for DefaultCircuitBreaker {
    async fn call<F, Fut, T>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
    {
        if !self.admit().await {
            return Err(CircuitBreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.record(true).await;
                Ok(value)
            }
            Err(error) => {
                self.record(false).await;
                Err(CircuitBreakerError::Inner(error))
            }
        }
    }

    async fn state(&self) -> CircuitState {
        self.state.read().await.circuit_state
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
