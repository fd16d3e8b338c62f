//! `reqwest`-backed [`NetworkProbe`](xping_core::environment::NetworkProbe).
//!
//! A lightweight `HEAD` request against the configured endpoint,
//! timing it to fill in [`NetworkMetrics`](xping_core::model::NetworkMetrics).
//! Grounded on `github_bot_sdk::client`'s pattern of a small dedicated
//! client for liveness checks, separate from the main upload client.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use xping_core::environment::NetworkProbe;
use xping_core::model::NetworkMetrics;

/// Probes reachability with a short-timeout `HEAD` request.
pub struct ReqwestNetworkProbe {
    client: reqwest::Client,
}

impl ReqwestNetworkProbe {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestNetworkProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkProbe for ReqwestNetworkProbe {
    async fn measure(&self, endpoint: &str) -> Option<NetworkMetrics> {
        let started = Instant::now();
        let response = self.client.head(endpoint).send().await.ok()?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        Some(NetworkMetrics {
            latency_ms: Some(latency_ms),
            online: response.status().is_success() || response.status().is_redirection(),
            connection_type: None,
            packet_loss_percent: None,
        })
    }
}

#[cfg(test)]
#[path = "network_probe_tests.rs"]
mod tests;
