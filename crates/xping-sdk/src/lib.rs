//! # Xping SDK
//!
//! Session Orchestrator (C7): the public entry point wiring the
//! Identity Generator, Environment Detector, Execution Tracker, Retry
//! Detector, Collector, and Uploader into one process-wide lifecycle.
//!
//! Grounded on `queue_keeper_service::AppState`'s composition-root
//! style (a struct gathering trait objects + config, constructed once)
//! and on the test-only `OnceLock<Arc<ServiceMetrics>>` singleton
//! pattern in `queue_keeper_api::lib_tests`, generalized here to a
//! `Mutex`-guarded cell holding the whole orchestrator so `Initialize`/
//! `Shutdown` can reset it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use xping_collector::{Collector, CollectorOptions, RecordOutcome};
use xping_core::config::Configuration;
use xping_core::environment::{DetectorOptions, EnvironmentDetector, NetworkProbe};
use xping_core::identity::{self, ParamValue};
use xping_core::model::{TestExecution, TestMetadata, TestSession};
use xping_core::resilience::CircuitBreakerConfig;
use xping_core::retry_detector::{self, DetectRetryMetadata, RetryDescriptor, RetryDetector};
use xping_core::tracker::ExecutionTracker;
use xping_core::uploader::Uploader;
use xping_core::{Outcome, Timestamp, XpingError};
use xping_uploader::{HttpUploader, HttpUploaderConfig, ReqwestNetworkProbe, RetryPolicy};

/// Lifecycle states of the process-wide orchestrator (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    Initialized,
    Active,
    Finalizing,
    Shutdown,
}

/// Facts about a single test invocation, as an adapter would assemble
/// them before handing off to [`record_test`]. Identity-generation and
/// orchestration-record fields are derived internally; the caller
/// supplies only what a host test framework actually knows.
#[derive(Debug, Clone)]
pub struct RecordTestRequest {
    pub fully_qualified_name: String,
    pub assembly: String,
    pub display_name: String,
    pub parameters: Vec<ParamValue>,
    pub test_name: String,
    pub outcome: Outcome,
    pub duration: Duration,
    pub start_time_utc: Timestamp,
    pub end_time_utc: Timestamp,
    pub metadata: TestMetadata,
    pub worker_id: Option<String>,
    pub thread_id: String,
    pub collection_name: Option<String>,
    /// Name of a retry attribute/annotation the host descriptor
    /// carried, if any (spec.md §4.4 path (a)).
    pub retry_attribute_name: Option<String>,
    /// Attempt number read directly off the host descriptor, if any.
    pub retry_attempt_number: Option<u32>,
    pub retry_max_retries: Option<u32>,
    pub retry_delay: Duration,
    pub retry_reason: Option<String>,
    pub exception_type: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
}

impl RetryDescriptor for RecordTestRequest {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn retry_attribute_name(&self) -> Option<&str> {
        self.retry_attribute_name.as_deref()
    }

    fn attempt_number(&self) -> Option<u32> {
        self.retry_attempt_number
    }

    fn max_retries(&self) -> Option<u32> {
        self.retry_max_retries
    }

    fn delay_between_retries(&self) -> Duration {
        self.retry_delay
    }

    fn retry_reason(&self) -> Option<String> {
        self.retry_reason.clone()
    }
}

/// Outcome of [`finalize`]: whether every buffered execution made it
/// out before the deadline.
#[derive(Debug, Clone)]
pub struct FinalizeResult {
    pub success: bool,
    pub stats: xping_collector::Stats,
}

/// Point-in-time snapshot exposed by [`get_services`].
#[derive(Debug, Clone)]
pub struct Services {
    pub state: OrchestratorState,
    pub stats: xping_collector::Stats,
    pub environment: String,
    pub project_id: String,
}

type FinalizingHook = Box<dyn Fn() + Send + Sync>;
type FinalizedHook = Box<dyn Fn(&FinalizeResult) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    on_finalizing: Option<FinalizingHook>,
    on_finalized: Option<FinalizedHook>,
}

struct Inner {
    config: Configuration,
    collector: Arc<Collector>,
    environment_detector: EnvironmentDetector,
    tracker: ExecutionTracker,
    retry_detector: RetryDetector<RecordTestRequest>,
    suite_started_at: Timestamp,
    state: Mutex<OrchestratorState>,
    session_built: AtomicBool,
    session_init: tokio::sync::Mutex<()>,
    flush_handle: Mutex<Option<JoinHandle<()>>>,
    hooks: Mutex<Hooks>,
}

impl Inner {
    fn new(config: Configuration) -> Result<Self, XpingError> {
        let api_endpoint = url::Url::parse(&config.api_endpoint)
            .expect("Configuration::validate already confirmed apiEndpoint parses");

        let circuit_breaker = CircuitBreakerConfig::default();
        let retry_policy = RetryPolicy::new(config.max_retries, config.retry_delay);

        let uploader_config = HttpUploaderConfig {
            api_endpoint,
            api_key: config.api_key.expose().to_string(),
            project_id: config.project_id.clone(),
            upload_timeout: config.upload_timeout,
            enable_compression: config.enable_compression,
            retry_policy,
            circuit_breaker,
        };
        let uploader: Arc<dyn Uploader> = Arc::new(
            HttpUploader::new(uploader_config)
                .map_err(|e| XpingError::Internal { message: e.to_string() })?,
        );

        let collector_options = CollectorOptions {
            enabled: config.enabled,
            batch_size: config.batch_size,
            sampling_rate: config.sampling_rate,
            flush_interval: config.flush_interval,
            enable_offline_queue: config.enable_offline_queue,
        };
        let collector = Arc::new(Collector::new(collector_options, uploader));

        let probe: Arc<dyn NetworkProbe> = if config.collect_network_metrics {
            Arc::new(ReqwestNetworkProbe::new())
        } else {
            Arc::new(xping_core::environment::NullNetworkProbe)
        };
        let detector_options = DetectorOptions {
            configured_environment: config.environment.clone(),
            auto_detect_ci_environment: config.auto_detect_ci_environment,
            collect_network_metrics: config.collect_network_metrics,
            network_probe_endpoint: Some(config.api_endpoint.clone()),
        };
        let environment_detector = EnvironmentDetector::new(detector_options, probe);

        let flush_handle = Mutex::new(Some(xping_collector::spawn_periodic_flush(collector.clone())));

        Ok(Self {
            config,
            collector,
            environment_detector,
            tracker: ExecutionTracker::new(),
            retry_detector: RetryDetector::new(),
            suite_started_at: Timestamp::now(),
            state: Mutex::new(OrchestratorState::Initialized),
            session_built: AtomicBool::new(false),
            session_init: tokio::sync::Mutex::new(()),
            flush_handle,
            hooks: Mutex::new(Hooks::default()),
        })
    }

    /// Build and bind the session on first access, and mark the
    /// orchestrator `Active`. Cheap no-op on every call after the
    /// first (spec.md §4.7: "Initialized -> Active: first RecordTest
    /// or GetServices").
    async fn ensure_active(&self) {
        if self.session_built.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.session_init.lock().await;
        if self.session_built.load(Ordering::Acquire) {
            return;
        }
        let environment_info = self.environment_detector.detect().await;
        let session = TestSession::new(environment_info);
        self.collector.set_session(session).await;
        *self.state.lock().expect("orchestrator state mutex poisoned") = OrchestratorState::Active;
        self.session_built.store(true, Ordering::Release);
    }

    fn build_execution(&self, request: RecordTestRequest) -> TestExecution {
        let identity = identity::generate(
            &request.fully_qualified_name,
            &request.assembly,
            &request.parameters,
            &request.display_name,
        );

        // Attempt number is needed for the tracker's retry-position-reuse
        // invariant regardless of whether a full RetryMetadata record is
        // produced, so it's derived directly off the descriptor here
        // (the same (a) descriptor counter, (b) display-name pattern,
        // (c) default-1 order the detector itself uses internally).
        let attempt_number = request
            .retry_attempt_number
            .or_else(|| retry_detector::detect_from_display_name(&request.display_name).map(|d| d.attempt_number))
            .unwrap_or(1);

        let retry = self
            .retry_detector
            .detect(&request, &identity.fingerprint, request.outcome);

        let worker_id = request.worker_id.clone().unwrap_or_else(|| request.thread_id.clone());
        let context = self.tracker.begin(worker_id, request.thread_id.clone(), attempt_number);

        let error_message_hash = request
            .error_message
            .as_deref()
            .and_then(identity::generate_error_message_hash);
        let stack_trace_hash = request
            .stack_trace
            .as_deref()
            .and_then(identity::generate_stack_trace_hash);

        let orchestration = context
            .clone()
            .into_record(self.suite_started_at, request.collection_name.clone());

        self.tracker.complete(
            &context,
            identity.fingerprint.clone(),
            request.test_name.clone(),
            request.outcome,
        );

        TestExecution {
            execution_id: xping_core::ExecutionId::new(),
            identity,
            test_name: request.test_name,
            outcome: request.outcome,
            duration: request.duration,
            start_time_utc: request.start_time_utc,
            end_time_utc: request.end_time_utc,
            metadata: request.metadata,
            orchestration,
            retry,
            exception_type: request.exception_type,
            error_message: request.error_message,
            stack_trace: request.stack_trace,
            error_message_hash,
            stack_trace_hash,
        }
    }
}

static INSTANCE: OnceLock<Mutex<Option<Arc<Inner>>>> = OnceLock::new();

fn cell() -> &'static Mutex<Option<Arc<Inner>>> {
    INSTANCE.get_or_init(|| Mutex::new(None))
}

fn current() -> Option<Arc<Inner>> {
    cell().lock().expect("orchestrator cell mutex poisoned").clone()
}

/// `Uninitialized -> Initialized`: validate `config`, construct C1-C6,
/// bind the periodic flush task. Idempotent: a second call while
/// already initialized is a no-op.
pub fn initialize(config: Configuration) -> Result<(), XpingError> {
    config.validate().map_err(XpingError::ConfigInvalid)?;

    let mut guard = cell().lock().expect("orchestrator cell mutex poisoned");
    if guard.is_some() {
        return Ok(());
    }
    let inner = Inner::new(config)?;
    info!("xping sdk initialized");
    *guard = Some(Arc::new(inner));
    Ok(())
}

/// Record one test execution. A no-op (returning
/// [`RecordOutcome::Disabled`]) when the orchestrator has not been
/// initialized.
pub async fn record_test(request: RecordTestRequest) -> RecordOutcome {
    let Some(inner) = current() else {
        warn!("record_test called before initialize, ignoring");
        return RecordOutcome::Disabled;
    };
    inner.ensure_active().await;
    let execution = inner.build_execution(request);
    inner.collector.record_test(execution)
}

/// Current counters and orchestrator state, also triggering the
/// `Initialized -> Active` transition on first call (spec.md §4.7).
pub async fn get_services() -> Option<Services> {
    let inner = current()?;
    inner.ensure_active().await;
    let state = *inner.state.lock().expect("orchestrator state mutex poisoned");
    Some(Services {
        state,
        stats: inner.collector.stats(),
        environment: inner.config.environment.clone(),
        project_id: inner.config.project_id.clone(),
    })
}

/// Current collector counters, or `None` before initialization.
pub fn get_stats() -> Option<xping_collector::Stats> {
    current().map(|inner| inner.collector.stats())
}

/// Register a callback invoked just before [`finalize`] begins
/// draining the buffer. Replaces any previously registered hook.
pub fn on_session_finalizing(callback: impl Fn() + Send + Sync + 'static) {
    if let Some(inner) = current() {
        inner.hooks.lock().expect("hooks mutex poisoned").on_finalizing = Some(Box::new(callback));
    }
}

/// Register a callback invoked with the [`FinalizeResult`] once
/// [`finalize`] completes. Replaces any previously registered hook.
pub fn on_session_finalized(callback: impl Fn(&FinalizeResult) + Send + Sync + 'static) {
    if let Some(inner) = current() {
        inner.hooks.lock().expect("hooks mutex poisoned").on_finalized = Some(Box::new(callback));
    }
}

/// `Active -> Finalizing -> Shutdown`: stop the periodic flush task,
/// perform one drain-and-upload cycle bounded by `uploadTimeout *
/// (maxRetries + 1)`, close the uploader, and reset the singleton so
/// [`initialize`] can be called again. A no-op returning a zeroed
/// result when never initialized.
pub async fn finalize() -> FinalizeResult {
    let Some(inner) = current() else {
        return FinalizeResult {
            success: true,
            stats: xping_collector::Stats::default(),
        };
    };

    *inner.state.lock().expect("orchestrator state mutex poisoned") = OrchestratorState::Finalizing;
    if let Some(callback) = inner
        .hooks
        .lock()
        .expect("hooks mutex poisoned")
        .on_finalizing
        .as_ref()
    {
        callback();
    }

    if let Some(handle) = inner.flush_handle.lock().expect("flush handle mutex poisoned").take() {
        handle.abort();
    }

    let deadline = inner.config.upload_timeout * (inner.config.max_retries + 1);
    inner.collector.close(deadline).await;

    let stats = inner.collector.stats();
    let result = FinalizeResult {
        success: stats.failed_to_upload == 0,
        stats,
    };

    if let Some(callback) = inner
        .hooks
        .lock()
        .expect("hooks mutex poisoned")
        .on_finalized
        .as_ref()
    {
        callback(&result);
    }

    *inner.state.lock().expect("orchestrator state mutex poisoned") = OrchestratorState::Shutdown;
    *cell().lock().expect("orchestrator cell mutex poisoned") = None;
    result
}

/// Immediately release the orchestrator without draining. Prefer
/// [`finalize`] in normal shutdown paths; this is for host-forced
/// teardown (e.g. test isolation). Idempotent.
pub fn shutdown() {
    if let Some(inner) = current() {
        if let Some(handle) = inner.flush_handle.lock().expect("flush handle mutex poisoned").take() {
            handle.abort();
        }
    }
    *cell().lock().expect("orchestrator cell mutex poisoned") = None;
}

/// Current lifecycle state, `Uninitialized` before the first
/// [`initialize`] call in this process (or after [`shutdown`]).
pub fn state() -> OrchestratorState {
    match current() {
        Some(inner) => *inner.state.lock().expect("orchestrator state mutex poisoned"),
        None => OrchestratorState::Uninitialized,
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
