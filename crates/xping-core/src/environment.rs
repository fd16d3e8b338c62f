//! Environment Detector (C2).
//!
//! Builds an [`EnvironmentInfo`] once per process and caches it for the
//! process lifetime. Detection is best-effort: every probe catches its
//! own failure and substitutes `"unknown"`/`false`, the same
//! graceful-degradation posture as
//! `queue_keeper_core::adapters::CircuitBreakerKeyVaultProvider`'s
//! cache fallback.

use crate::model::{EnvironmentInfo, NetworkMetrics};
use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::OnceLock;
use std::sync::Arc;

/// Probes network reachability against a configured endpoint.
///
/// Kept as a trait so this crate never depends on an HTTP client —
/// `xping-uploader` supplies the `reqwest`-backed implementation used
/// in production; tests supply a fixed-response fake.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Measure latency/reachability against `endpoint`. Returns `None`
    /// on any failure (spec.md §4.2: "replaced with null on error").
    async fn measure(&self, endpoint: &str) -> Option<NetworkMetrics>;
}

/// A [`NetworkProbe`] that always reports unreachable; used when
/// `collectNetworkMetrics` is disabled, or as a test double.
#[derive(Debug, Default)]
pub struct NullNetworkProbe;

#[async_trait]
impl NetworkProbe for NullNetworkProbe {
    async fn measure(&self, _endpoint: &str) -> Option<NetworkMetrics> {
        None
    }
}

/// CI platforms recognized by priority order (spec.md §4.2). First
/// match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiPlatform {
    GitHubActions,
    AzureDevOps,
    Jenkins,
    GitLabCi,
    CircleCi,
    Travis,
    TeamCity,
    Bitbucket,
    AppVeyor,
    Generic,
}

impl CiPlatform {
    fn as_str(&self) -> &'static str {
        match self {
            Self::GitHubActions => "github-actions",
            Self::AzureDevOps => "azure-devops",
            Self::Jenkins => "jenkins",
            Self::GitLabCi => "gitlab-ci",
            Self::CircleCi => "circleci",
            Self::Travis => "travis",
            Self::TeamCity => "teamcity",
            Self::Bitbucket => "bitbucket",
            Self::AppVeyor => "appveyor",
            Self::Generic => "ci",
        }
    }
}

/// Read `$1` from a generic `getenv`-like lookup. Extracted so tests
/// can inject a fake environment map instead of mutating process-wide
/// env vars (which would make tests order-dependent under parallel
/// execution).
pub trait EnvSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Fixed map, for deterministic tests.
#[derive(Debug, Default, Clone)]
pub struct FakeEnv(pub HashMap<String, String>);

impl EnvSource for FakeEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Detect the first matching CI platform, in the fixed priority order
/// from spec.md §4.2.
pub fn detect_ci_platform(env: &dyn EnvSource) -> Option<CiPlatform> {
    if env.get("GITHUB_ACTIONS").as_deref() == Some("true") {
        return Some(CiPlatform::GitHubActions);
    }
    if env.get("TF_BUILD").is_some() {
        return Some(CiPlatform::AzureDevOps);
    }
    if env.get("JENKINS_URL").is_some() {
        return Some(CiPlatform::Jenkins);
    }
    if env.get("GITLAB_CI").as_deref() == Some("true") {
        return Some(CiPlatform::GitLabCi);
    }
    if env.get("CIRCLECI").as_deref() == Some("true") {
        return Some(CiPlatform::CircleCi);
    }
    if env.get("TRAVIS").as_deref() == Some("true") {
        return Some(CiPlatform::Travis);
    }
    if env.get("TEAMCITY_VERSION").is_some() {
        return Some(CiPlatform::TeamCity);
    }
    if env.get("BITBUCKET_PIPELINE_UUID").is_some() {
        return Some(CiPlatform::Bitbucket);
    }
    if env.get("APPVEYOR").as_deref() == Some("True") {
        return Some(CiPlatform::AppVeyor);
    }
    if env.get("CI").as_deref() == Some("true") {
        return Some(CiPlatform::Generic);
    }
    None
}

/// Per-platform custom properties (repo, run id, branch, commit) when
/// present in the environment.
fn ci_custom_properties(platform: CiPlatform, env: &dyn EnvSource) -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert("ciPlatform".to_string(), platform.as_str().to_string());

    let mut set = |key: &str, value: Option<String>| {
        if let Some(v) = value {
            props.insert(key.to_string(), v);
        }
    };

    match platform {
        CiPlatform::GitHubActions => {
            set("repository", env.get("GITHUB_REPOSITORY"));
            set("runId", env.get("GITHUB_RUN_ID"));
            set("branch", env.get("GITHUB_REF_NAME"));
            set("commit", env.get("GITHUB_SHA"));
        }
        CiPlatform::AzureDevOps => {
            set("repository", env.get("BUILD_REPOSITORY_NAME"));
            set("runId", env.get("BUILD_BUILDID"));
            set("branch", env.get("BUILD_SOURCEBRANCHNAME"));
            set("commit", env.get("BUILD_SOURCEVERSION"));
        }
        CiPlatform::GitLabCi => {
            set("repository", env.get("CI_PROJECT_PATH"));
            set("runId", env.get("CI_PIPELINE_ID"));
            set("branch", env.get("CI_COMMIT_REF_NAME"));
            set("commit", env.get("CI_COMMIT_SHA"));
        }
        CiPlatform::CircleCi => {
            set("repository", env.get("CIRCLE_PROJECT_REPONAME"));
            set("runId", env.get("CIRCLE_BUILD_NUM"));
            set("branch", env.get("CIRCLE_BRANCH"));
            set("commit", env.get("CIRCLE_SHA1"));
        }
        CiPlatform::Travis => {
            set("repository", env.get("TRAVIS_REPO_SLUG"));
            set("runId", env.get("TRAVIS_BUILD_NUMBER"));
            set("branch", env.get("TRAVIS_BRANCH"));
            set("commit", env.get("TRAVIS_COMMIT"));
        }
        CiPlatform::Bitbucket => {
            set("repository", env.get("BITBUCKET_REPO_SLUG"));
            set("runId", env.get("BITBUCKET_BUILD_NUMBER"));
            set("branch", env.get("BITBUCKET_BRANCH"));
            set("commit", env.get("BITBUCKET_COMMIT"));
        }
        CiPlatform::AppVeyor => {
            set("repository", env.get("APPVEYOR_REPO_NAME"));
            set("runId", env.get("APPVEYOR_BUILD_NUMBER"));
            set("branch", env.get("APPVEYOR_REPO_BRANCH"));
            set("commit", env.get("APPVEYOR_REPO_COMMIT"));
        }
        CiPlatform::Jenkins | CiPlatform::TeamCity | CiPlatform::Generic => {}
    }

    props
}

/// Resolve `environmentName` per spec.md §4.2's fixed priority order.
fn resolve_environment_name(
    configured: &str,
    auto_detect_ci: bool,
    ci_platform: Option<CiPlatform>,
    env: &dyn EnvSource,
) -> String {
    if let Some(explicit) = env.get("XPING_ENVIRONMENT") {
        return explicit;
    }
    if auto_detect_ci && ci_platform.is_some() {
        return "CI".to_string();
    }
    if !configured.is_empty() {
        return configured.to_string();
    }
    if let Some(v) = env.get("ASPNETCORE_ENVIRONMENT") {
        return v;
    }
    if let Some(v) = env.get("DOTNET_ENVIRONMENT") {
        return v;
    }
    "Local".to_string()
}

/// Detect whether the process is running inside a container.
fn detect_container(env: &dyn EnvSource) -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }
    if env.get("KUBERNETES_SERVICE_HOST").is_some() {
        return true;
    }
    if let Ok(cgroup) = std::fs::read_to_string("/proc/1/cgroup") {
        if cgroup.contains("docker") || cgroup.contains("kubepods") {
            return true;
        }
    }
    false
}

/// Configuration inputs the detector needs (a projection of the full
/// SDK [`crate::config::Configuration`]).
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub configured_environment: String,
    pub auto_detect_ci_environment: bool,
    pub collect_network_metrics: bool,
    pub network_probe_endpoint: Option<String>,
}

/// Builds and caches the process-wide [`EnvironmentInfo`].
pub struct EnvironmentDetector {
    options: DetectorOptions,
    env: Box<dyn EnvSource>,
    probe: Arc<dyn NetworkProbe>,
    cached: OnceLock<EnvironmentInfo>,
}

impl EnvironmentDetector {
    /// Construct a detector against the real process environment and
    /// the supplied network probe (a no-op probe when
    /// `collect_network_metrics` is `false`).
    pub fn new(options: DetectorOptions, probe: Arc<dyn NetworkProbe>) -> Self {
        Self {
            options,
            env: Box::new(ProcessEnv),
            probe,
            cached: OnceLock::new(),
        }
    }

    /// Construct a detector against a fixed fake environment, for tests.
    pub fn with_env(
        options: DetectorOptions,
        env: FakeEnv,
        probe: Arc<dyn NetworkProbe>,
    ) -> Self {
        Self {
            options,
            env: Box::new(env),
            probe,
            cached: OnceLock::new(),
        }
    }

    /// Get the cached `EnvironmentInfo`, building it on first access.
    pub async fn detect(&self) -> EnvironmentInfo {
        if let Some(cached) = self.cached.get() {
            return cached.clone();
        }
        let info = self.build().await;
        // `OnceLock::set` can lose a race under concurrent first access;
        // that is fine, both branches compute the same best-effort
        // snapshot and the loser's copy is simply discarded.
        let _ = self.cached.set(info.clone());
        info
    }

    async fn build(&self) -> EnvironmentInfo {
        let ci_platform = detect_ci_platform(self.env.as_ref());
        let is_ci_environment = ci_platform.is_some();

        let environment_name = resolve_environment_name(
            &self.options.configured_environment,
            self.options.auto_detect_ci_environment,
            ci_platform,
            self.env.as_ref(),
        );

        let mut custom_properties = ci_platform
            .map(|p| ci_custom_properties(p, self.env.as_ref()))
            .unwrap_or_default();

        if detect_container(self.env.as_ref()) {
            custom_properties.insert("container".to_string(), "true".to_string());
        }

        let network_metrics = if self.options.collect_network_metrics {
            match &self.options.network_probe_endpoint {
                Some(endpoint) => self.probe.measure(endpoint).await,
                None => None,
            }
        } else {
            None
        };

        EnvironmentInfo {
            machine_name: hostname_or_unknown(),
            operating_system: std::env::consts::OS.to_string(),
            runtime_version: option_env!("CARGO_PKG_RUST_VERSION")
                .unwrap_or("unknown")
                .to_string(),
            framework: "xping-sdk".to_string(),
            environment_name,
            is_ci_environment,
            network_metrics,
            custom_properties,
        }
    }
}

fn hostname_or_unknown() -> String {
    env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
