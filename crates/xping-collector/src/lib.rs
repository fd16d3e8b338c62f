//! # Xping Collector (C5)
//!
//! Buffers recorded executions, applies the sampling gate, and drives
//! flush-to-uploader cycles. `record_test` is non-blocking: all I/O
//! happens behind `flush`/`close`.
//!
//! Grounded on `queue_keeper_service::AppState`'s shared-mutable-state
//! composition (small `Arc<Mutex<...>>`/atomics cloned into handlers)
//! and on the single-permit semaphore idiom used throughout the
//! teacher's resilience code to guard "only one of this running at a
//! time" sections.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tracing::{debug, info, warn};
use xping_core::model::{TestExecution, TestSession};
use xping_core::uploader::Uploader;

/// Point-in-time collector counters plus current buffer depth.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub recorded: u64,
    pub sampled: u64,
    pub uploaded: u64,
    pub failed_to_upload: u64,
    pub flushes: u64,
    pub buffer_size: u64,
}

/// Outcome of a single `record_test` call, useful for tests and for
/// adapters that want to react to drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Recorded but dropped by the SDK's enable flag.
    Disabled,
    /// Recorded, dropped by the sampling gate.
    Sampled,
    /// Recorded and enqueued; `true` if this enqueue crossed `batchSize`
    /// and a flush was scheduled.
    Kept { flush_scheduled: bool },
}

struct Counters {
    recorded: AtomicU64,
    sampled: AtomicU64,
    uploaded: AtomicU64,
    failed_to_upload: AtomicU64,
    flushes: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            recorded: AtomicU64::new(0),
            sampled: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
            failed_to_upload: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }
}

/// Collector configuration (a projection of the full SDK configuration).
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub enabled: bool,
    pub batch_size: u32,
    pub sampling_rate: f64,
    pub flush_interval: Duration,
    pub enable_offline_queue: bool,
}

/// Buffers executions, applies sampling, and coordinates flush cycles.
pub struct Collector {
    options: CollectorOptions,
    uploader: Arc<dyn Uploader>,
    buffer: Mutex<VecDeque<TestExecution>>,
    counters: Counters,
    flush_permit: Semaphore,
    session: RwLock<Option<TestSession>>,
    rng: Mutex<StdRng>,
    buffer_full_tx: watch::Sender<bool>,
    buffer_full_rx: watch::Receiver<bool>,
}

impl Collector {
    /// Construct a collector bound to `uploader`. Call [`Self::set_session`]
    /// before the first [`Self::flush`].
    pub fn new(options: CollectorOptions, uploader: Arc<dyn Uploader>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            options,
            uploader,
            buffer: Mutex::new(VecDeque::new()),
            counters: Counters::new(),
            flush_permit: Semaphore::new(1),
            session: RwLock::new(None),
            rng: Mutex::new(StdRng::from_os_rng()),
            buffer_full_tx: tx,
            buffer_full_rx: rx,
        }
    }

    /// Observe the `bufferFull` signal (spec.md §4.5): flips to `true`
    /// whenever the buffer reaches `batchSize`, for host adapters that
    /// want to react to backpressure. Observational only, never blocks
    /// `record_test`.
    pub fn buffer_full_signal(&self) -> watch::Receiver<bool> {
        self.buffer_full_rx.clone()
    }

    /// Bind the session this collector uploads against. Idempotent
    /// after the first call within a lifecycle.
    pub async fn set_session(&self, session: TestSession) {
        let mut guard = self.session.write().await;
        if guard.is_none() {
            *guard = Some(session);
        }
    }

    /// Record one execution. Never performs I/O.
    pub fn record_test(&self, execution: TestExecution) -> RecordOutcome {
        if !self.options.enabled {
            return RecordOutcome::Disabled;
        }

        self.counters.recorded.fetch_add(1, Ordering::SeqCst);

        if !self.sample_gate() {
            return RecordOutcome::Sampled;
        }

        self.counters.sampled.fetch_add(1, Ordering::SeqCst);

        let queue_len = {
            let mut buffer = self.buffer.lock().expect("collector buffer mutex poisoned");
            buffer.push_back(execution);
            buffer.len()
        };

        let flush_scheduled = queue_len as u32 >= self.options.batch_size;
        if flush_scheduled {
            let _ = self.buffer_full_tx.send(true);
        }

        RecordOutcome::Kept { flush_scheduled }
    }

    /// Uniform-probability sampling gate under a mutex-guarded,
    /// non-cryptographic PRNG (spec.md §4.5 — acceptable because
    /// sampling is not a security boundary).
    fn sample_gate(&self) -> bool {
        if self.options.sampling_rate >= 1.0 {
            return true;
        }
        if self.options.sampling_rate <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().expect("collector rng mutex poisoned");
        rng.random::<f64>() < self.options.sampling_rate
    }

    /// Drain up to `batchSize` items and upload them, acquiring the
    /// single flush permit. If a flush is already in progress, returns
    /// immediately without doing anything.
    pub async fn flush(&self) {
        let Ok(_permit) = self.flush_permit.try_acquire() else {
            debug!("flush already in progress, skipping");
            return;
        };

        // Stamp `completedAt` on the first flush that observes a
        // non-empty buffer (spec.md §4.5 — literally as the source
        // does it; see the Open Question on this timing in DESIGN.md).
        let session = {
            let buffer_nonempty = !self.buffer.lock().expect("collector buffer mutex poisoned").is_empty();
            let mut guard = self.session.write().await;
            let Some(session) = guard.as_mut() else {
                warn!("flush called before a session was bound, skipping");
                return;
            };
            if buffer_nonempty && session.completed_at.is_none() {
                session.completed_at = Some(xping_core::Timestamp::now());
            }
            session.clone()
        };

        let session_upload = self.uploader.upload_session(&session).await;
        if !session_upload.success {
            debug!(error = ?session_upload.error_message, "session upload failed");
        }

        let drained: Vec<TestExecution> = {
            let mut buffer = self.buffer.lock().expect("collector buffer mutex poisoned");
            let take = (self.options.batch_size as usize).min(buffer.len());
            buffer.drain(..take).collect()
        };

        if drained.is_empty() {
            self.counters.flushes.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let batch_upload = self.uploader.upload_batch(&session, &drained).await;
        self.counters.flushes.fetch_add(1, Ordering::SeqCst);

        if batch_upload.success {
            self.counters
                .uploaded
                .fetch_add(drained.len() as u64, Ordering::SeqCst);
            info!(count = drained.len(), "batch uploaded");
        } else {
            self.counters
                .failed_to_upload
                .fetch_add(drained.len() as u64, Ordering::SeqCst);
            debug!(error = ?batch_upload.error_message, "batch upload failed");

            if self.options.enable_offline_queue {
                let mut buffer = self.buffer.lock().expect("collector buffer mutex poisoned");
                for execution in drained.into_iter().rev() {
                    buffer.push_front(execution);
                }
            }
        }
    }

    /// Current counters and buffer depth.
    pub fn stats(&self) -> Stats {
        let buffer_size = self.buffer.lock().expect("collector buffer mutex poisoned").len() as u64;
        Stats {
            recorded: self.counters.recorded.load(Ordering::SeqCst),
            sampled: self.counters.sampled.load(Ordering::SeqCst),
            uploaded: self.counters.uploaded.load(Ordering::SeqCst),
            failed_to_upload: self.counters.failed_to_upload.load(Ordering::SeqCst),
            flushes: self.counters.flushes.load(Ordering::SeqCst),
            buffer_size,
        }
    }

    /// Drain the buffer batch by batch, bounded overall by `deadline`,
    /// then release resources. A buffer larger than one `batchSize`
    /// needs several successful flushes to empty; stops early once the
    /// buffer is empty, or is cut off by the deadline with whatever is
    /// left over counted in `failedToUpload` via the offline queue's
    /// requeue path (or simply left buffered, if offline queueing is
    /// disabled). Idempotent: calling more than once is safe, the
    /// second call simply flushes an empty buffer.
    pub async fn close(&self, deadline: Duration) {
        let drained = tokio::time::timeout(deadline, async {
            loop {
                self.flush().await;
                let empty = self.buffer.lock().expect("collector buffer mutex poisoned").is_empty();
                if empty {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("close deadline elapsed with items still buffered");
        }
        self.uploader.close().await;
    }
}

/// Spawn a background task that calls `flush` every `flush_interval`.
/// Firing is silent if the buffer is empty (the flush itself no-ops).
/// Returns a handle the caller should abort on shutdown.
pub fn spawn_periodic_flush(collector: Arc<Collector>) -> tokio::task::JoinHandle<()> {
    let interval = collector.options.flush_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it.
        loop {
            ticker.tick().await;
            collector.flush().await;
        }
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
