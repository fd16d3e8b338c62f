//! Execution Tracker (C3).
//!
//! Assigns per-worker ordinal positions, links each execution to the
//! previous execution observed on the same worker, and reports the
//! concurrency level in effect when an execution started.
//!
//! Grounded on `queue_keeper_service::AppState`'s shared-mutable-state
//! composition (an `Arc<Mutex<...>>` guarding small counters, cloned
//! cheaply into every call site) rather than the `RwLock`-guarded
//! `InternalState` used by the circuit breaker: tracker state changes
//! on every single call, so a `RwLock`'s extra read/write distinction
//! buys nothing and a plain `Mutex` is simpler.

use crate::{Outcome, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifies the worker (thread/task) an execution ran on.
pub type WorkerId = String;

/// Everything the tracker knows about the previous completion on a
/// given worker.
#[derive(Debug, Clone)]
struct WorkerState {
    position_in_suite: u64,
    last_test_id: Option<String>,
    last_test_name: Option<String>,
    last_outcome: Option<Outcome>,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self {
            position_in_suite: 0,
            last_test_id: None,
            last_test_name: None,
            last_outcome: None,
        }
    }
}

/// Ordinal and linkage data for a single execution, returned by
/// [`ExecutionTracker::begin`] and completed by
/// [`ExecutionTracker::complete`].
#[derive(Debug, Clone)]
pub struct OrchestrationContext {
    pub position_in_suite: u64,
    pub global_position: u64,
    pub previous_test_id: Option<String>,
    pub previous_test_name: Option<String>,
    pub previous_test_outcome: Option<Outcome>,
    pub was_parallelized: bool,
    pub concurrent_test_count: u32,
    pub thread_id: String,
    pub worker_id: WorkerId,
    start_time: Timestamp,
}

impl OrchestrationContext {
    /// Finish building an [`crate::model::OrchestrationRecord`] once the
    /// execution's duration relative to suite start is known.
    pub fn into_record(
        self,
        suite_started_at: Timestamp,
        collection_name: Option<String>,
    ) -> crate::model::OrchestrationRecord {
        crate::model::OrchestrationRecord {
            position_in_suite: self.position_in_suite,
            global_position: self.global_position,
            previous_test_id: self.previous_test_id,
            previous_test_name: self.previous_test_name,
            previous_test_outcome: self.previous_test_outcome,
            was_parallelized: self.was_parallelized,
            concurrent_test_count: self.concurrent_test_count,
            thread_id: self.thread_id,
            worker_id: self.worker_id,
            suite_elapsed_time: self.start_time.duration_since(suite_started_at),
            collection_name,
        }
    }
}

/// Tracks per-worker ordering and active-execution concurrency for the
/// lifetime of a process.
pub struct ExecutionTracker {
    global_position: AtomicU64,
    active_count: AtomicU32,
    workers: Mutex<HashMap<WorkerId, WorkerState>>,
}

impl ExecutionTracker {
    /// Create a fresh tracker. One instance is shared for the whole
    /// session.
    pub fn new() -> Self {
        Self {
            global_position: AtomicU64::new(0),
            active_count: AtomicU32::new(0),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Record the start of a new execution on `worker_id`, returning
    /// its ordinal position and linkage to the previous execution on
    /// the same worker. Call [`Self::complete`] once the execution
    /// finishes.
    ///
    /// `attempt_number > 1` (a retry) reuses the worker's current
    /// position instead of advancing it, so every attempt of the same
    /// test reports the same `position_in_suite` (spec.md §8: "For all
    /// retried attempts on the same worker, positionInSuite equals the
    /// first attempt's").
    pub fn begin(
        &self,
        worker_id: impl Into<WorkerId>,
        thread_id: impl Into<String>,
        attempt_number: u32,
    ) -> OrchestrationContext {
        let worker_id = worker_id.into();
        let concurrent_test_count = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        let global_position = self.global_position.fetch_add(1, Ordering::SeqCst) + 1;

        let mut workers = self.workers.lock().expect("tracker mutex poisoned");
        let state = workers.entry(worker_id.clone()).or_default();
        let reuse_position = attempt_number > 1 && state.position_in_suite > 0;
        if !reuse_position {
            state.position_in_suite += 1;
        }

        OrchestrationContext {
            position_in_suite: state.position_in_suite,
            global_position,
            previous_test_id: state.last_test_id.clone(),
            previous_test_name: state.last_test_name.clone(),
            previous_test_outcome: state.last_outcome,
            was_parallelized: concurrent_test_count > 1,
            concurrent_test_count,
            thread_id: thread_id.into(),
            worker_id,
            start_time: Timestamp::now(),
        }
    }

    /// Record that the execution begun with `context` has finished
    /// with `outcome`, updating the per-worker "previous test" linkage
    /// and releasing this execution's concurrency slot.
    pub fn complete(
        &self,
        context: &OrchestrationContext,
        test_id: impl Into<String>,
        test_name: impl Into<String>,
        outcome: Outcome,
    ) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        let mut workers = self.workers.lock().expect("tracker mutex poisoned");
        let state = workers.entry(context.worker_id.clone()).or_default();
        state.last_test_id = Some(test_id.into());
        state.last_test_name = Some(test_name.into());
        state.last_outcome = Some(outcome);
    }

    /// Current number of in-flight (begun, not yet completed)
    /// executions across all workers.
    pub fn active_count(&self) -> u32 {
        self.active_count.load(Ordering::SeqCst)
    }
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
