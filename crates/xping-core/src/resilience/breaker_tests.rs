//! Tests for the rolling-window circuit breaker.

use super::*;
use std::time::Duration as StdDuration;

fn test_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        minimum_samples: 4,
        failure_ratio_threshold: 0.5,
        open_duration: StdDuration::from_secs(30),
        half_open_max_requests: 1,
        window_size: 10,
    }
}

async fn fail(breaker: &DefaultCircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
    breaker.call(|| async { Err::<(), _>("boom") }).await
}

async fn succeed(breaker: &DefaultCircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
    breaker.call(|| async { Ok::<(), &'static str>(()) }).await
}

mod closed_state {
    use super::*;

    #[tokio::test]
    async fn starts_closed() {
        let breaker = DefaultCircuitBreaker::new(test_config());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn calls_pass_through_below_minimum_samples() {
        let breaker = DefaultCircuitBreaker::new(test_config());
        for _ in 0..3 {
            assert!(fail(&breaker).await.is_err());
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    /// spec.md §8: failure ratio ≥ 0.5 over ≥ minimum_samples opens the circuit.
    #[tokio::test]
    async fn opens_once_failure_ratio_threshold_is_reached() {
        let breaker = DefaultCircuitBreaker::new(test_config());
        fail(&breaker).await.ok();
        fail(&breaker).await.ok();
        succeed(&breaker).await.ok();
        fail(&breaker).await.ok();

        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn stays_closed_when_failure_ratio_is_below_threshold() {
        let breaker = DefaultCircuitBreaker::new(test_config());
        succeed(&breaker).await.ok();
        succeed(&breaker).await.ok();
        succeed(&breaker).await.ok();
        fail(&breaker).await.ok();

        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}

mod open_state {
    use super::*;

    async fn forced_open(config: CircuitBreakerConfig) -> DefaultCircuitBreaker {
        let breaker = DefaultCircuitBreaker::new(config);
        for _ in 0..4 {
            fail(&breaker).await.ok();
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
        breaker
    }

    #[tokio::test]
    async fn rejects_calls_fast_without_invoking_operation() {
        let breaker = forced_open(test_config()).await;
        let invoked = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked_clone = invoked.clone();

        let result = breaker
            .call(move || {
                invoked_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                async { Ok::<(), &'static str>(()) }
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_to_half_open_after_break_duration() {
        let mut config = test_config();
        config.open_duration = StdDuration::from_millis(100);
        let breaker = forced_open(config).await;

        tokio::time::advance(StdDuration::from_millis(150)).await;

        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}

mod half_open_state {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn successful_probe_closes_the_circuit() {
        let mut config = test_config();
        config.open_duration = StdDuration::from_millis(50);
        let breaker = DefaultCircuitBreaker::new(config);
        for _ in 0..4 {
            fail(&breaker).await.ok();
        }
        tokio::time::advance(StdDuration::from_millis(80)).await;

        succeed(&breaker).await.ok();
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_the_circuit() {
        let mut config = test_config();
        config.open_duration = StdDuration::from_millis(50);
        let breaker = DefaultCircuitBreaker::new(config);
        for _ in 0..4 {
            fail(&breaker).await.ok();
        }
        tokio::time::advance(StdDuration::from_millis(80)).await;

        fail(&breaker).await.ok();
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

}

mod metrics {
    use super::*;

    #[tokio::test]
    async fn tracks_total_calls_and_failures() {
        let breaker = DefaultCircuitBreaker::new(test_config());
        succeed(&breaker).await.ok();
        fail(&breaker).await.ok();

        let metrics = breaker.metrics().await;
        assert_eq!(metrics.total_calls, 2);
        assert_eq!(metrics.total_failures, 1);
    }
}
