//! Configuration (spec.md §3, §6).
//!
//! A fixed struct of recognized options with validated defaults,
//! overridable by `XPING_*` environment variables through the `config`
//! crate — the same layering `queue_keeper_api::config::ServiceConfig`
//! uses for its own settings. Secrets never appear in `Debug`/log
//! output, matching that module's redacted `ProviderSecretConfig`.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroize;

/// Recognized configuration options (spec.md §3's Configuration table).
/// Durations are stored as [`Duration`] internally; on the wire/in env
/// vars they parse as integer seconds or an ISO-8601 duration string.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub api_endpoint: String,

    #[serde(skip_serializing)]
    pub api_key: ApiKey,

    pub project_id: String,

    #[serde(with = "duration_seconds")]
    pub flush_interval: Duration,
    pub batch_size: u32,
    pub environment: String,
    pub auto_detect_ci_environment: bool,
    pub enabled: bool,
    pub capture_stack_traces: bool,
    pub enable_compression: bool,
    pub max_retries: u32,
    #[serde(with = "duration_seconds")]
    pub retry_delay: Duration,
    pub sampling_rate: f64,
    #[serde(with = "duration_seconds")]
    pub upload_timeout: Duration,
    pub collect_network_metrics: bool,
    pub enable_offline_queue: bool,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("flush_interval", &self.flush_interval)
            .field("batch_size", &self.batch_size)
            .field("environment", &self.environment)
            .field("auto_detect_ci_environment", &self.auto_detect_ci_environment)
            .field("enabled", &self.enabled)
            .field("capture_stack_traces", &self.capture_stack_traces)
            .field("enable_compression", &self.enable_compression)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("sampling_rate", &self.sampling_rate)
            .field("upload_timeout", &self.upload_timeout)
            .field("collect_network_metrics", &self.collect_network_metrics)
            .field("enable_offline_queue", &self.enable_offline_queue)
            .finish()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            api_key: ApiKey::default(),
            project_id: String::new(),
            flush_interval: Duration::from_secs(30),
            batch_size: 100,
            environment: "Local".to_string(),
            auto_detect_ci_environment: true,
            enabled: true,
            capture_stack_traces: true,
            enable_compression: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            sampling_rate: 1.0,
            upload_timeout: Duration::from_secs(30),
            collect_network_metrics: true,
            enable_offline_queue: false,
        }
    }
}

impl Configuration {
    /// Validate against spec.md §3's invariant: `apiKey`/`projectId`
    /// must be non-empty and `apiEndpoint` must be a valid HTTP/HTTPS
    /// URL. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.0.is_empty() {
            return Err(ValidationError::Required {
                field: "apiKey".to_string(),
            });
        }
        if self.project_id.is_empty() {
            return Err(ValidationError::Required {
                field: "projectId".to_string(),
            });
        }
        let url = url::Url::parse(&self.api_endpoint).map_err(|e| ValidationError::InvalidFormat {
            field: "apiEndpoint".to_string(),
            message: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationError::InvalidFormat {
                field: "apiEndpoint".to_string(),
                message: format!("scheme must be http or https, got '{}'", url.scheme()),
            });
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ValidationError::OutOfRange {
                field: "batchSize".to_string(),
                message: "must be in [1, 1000]".to_string(),
            });
        }
        if self.max_retries > 10 {
            return Err(ValidationError::OutOfRange {
                field: "maxRetries".to_string(),
                message: "must be in [0, 10]".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ValidationError::OutOfRange {
                field: "samplingRate".to_string(),
                message: "must be in [0.0, 1.0]".to_string(),
            });
        }
        Ok(())
    }

    /// Build configuration by layering `XPING_*` environment variables
    /// over struct defaults, then validating the result. Per spec.md
    /// §6, an env var present but unparsable for its field is ignored
    /// and the default retained, rather than failing the whole load.
    pub fn load() -> Result<Self, ValidationError> {
        let env = config::Config::builder()
            .add_source(config::Environment::with_prefix("XPING").separator("_"))
            .build()
            .unwrap_or_else(|_| config::Config::default());

        let mut config = Self::default();

        if let Ok(v) = env.get_string("apiendpoint") {
            config.api_endpoint = v;
        }
        if let Ok(v) = env.get_string("apikey") {
            config.api_key = ApiKey::new(v);
        }
        if let Ok(v) = env.get_string("projectid") {
            config.project_id = v;
        }
        if let Some(v) = get_duration(&env, "flushinterval") {
            config.flush_interval = v;
        }
        if let Ok(v) = env.get_int("batchsize") {
            config.batch_size = v as u32;
        }
        if let Ok(v) = env.get_string("environment") {
            config.environment = v;
        }
        if let Ok(v) = env.get_bool("autodetectcienvironment") {
            config.auto_detect_ci_environment = v;
        }
        if let Ok(v) = env.get_bool("enabled") {
            config.enabled = v;
        }
        if let Ok(v) = env.get_bool("capturestacktraces") {
            config.capture_stack_traces = v;
        }
        if let Ok(v) = env.get_bool("enablecompression") {
            config.enable_compression = v;
        }
        if let Ok(v) = env.get_int("maxretries") {
            config.max_retries = v as u32;
        }
        if let Some(v) = get_duration(&env, "retrydelay") {
            config.retry_delay = v;
        }
        if let Ok(v) = env.get_float("samplingrate") {
            config.sampling_rate = v;
        }
        if let Some(v) = get_duration(&env, "uploadtimeout") {
            config.upload_timeout = v;
        }
        if let Ok(v) = env.get_bool("collectnetworkmetrics") {
            config.collect_network_metrics = v;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parse a duration env value as whole seconds; ISO-8601 `PT..S` forms
/// are accepted as a convenience, anything else is treated as absent
/// so the default is retained.
fn get_duration(env: &config::Config, key: &str) -> Option<Duration> {
    let raw = env.get_string(key).ok()?;
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    parse_iso8601_seconds(&raw).map(Duration::from_secs)
}

/// Parse a minimal ISO-8601 duration of the form `PT<n>S` (no other
/// designators supported; spec.md §6 only requires integer-seconds and
/// this one common textual form).
fn parse_iso8601_seconds(raw: &str) -> Option<u64> {
    let stripped = raw.strip_prefix("PT")?.strip_suffix('S')?;
    stripped.parse().ok()
}

/// Secret API key. Zeroized on drop; never appears in `Debug` output.
#[derive(Clone, Default, Zeroize)]
#[zeroize(drop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self(raw))
    }
}

mod duration_seconds {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
