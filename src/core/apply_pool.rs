//! Parallel apply pool running sequenced jobs through a [`JobQueue`].
//!
//! Jobs are numbered in submission order. Each job is registered in the queue as it is
//! submitted, so every later job sees it as a conflict candidate, and is then dispatched
//! to a dedicated worker thread which starts it, applies it, and ends it.
//!
//! # Design
//!
//! - **Sequence-ordered conflicts**: a job only waits for conflicting jobs with a lower
//!   sequence number, so the wait-for graph can't contain a cycle.
//! - **No capacity stalls**: at most `max_concurrent` workers exist, so a worker never
//!   parks in the admission gate while conflict waiters hold every seat.
//! - **Clean shutdown**: dropping the sender lets workers drain the channel and exit.

use std::cmp::Ordering as CmpOrdering;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, SendError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::builders::JobQueueBuilder;
use crate::config::ApplyPoolConfig;
use crate::core::error::{AppResult, ApplyError};
use crate::core::job_queue::{JobQueue, QueueStats};
use crate::core::policy::ConflictPolicy;
use crate::core::slot::SlotHandle;

/// Applies one job on a worker thread once the queue has admitted it.
pub trait JobExecutor<J>: Send + Sync + Clone + 'static {
    /// Apply `job`, numbered `seqno`. Errors are logged and counted; the pool keeps going.
    ///
    /// # Errors
    ///
    /// Whatever the job's own application logic reports.
    fn apply(&self, seqno: u64, job: &J) -> AppResult<()>;
}

impl<J, T> JobExecutor<J> for T
where
    T: Fn(u64, &J) -> AppResult<()> + Send + Sync + Clone + 'static,
{
    fn apply(&self, seqno: u64, job: &J) -> AppResult<()> {
        self(seqno, job)
    }
}

/// A job and its position in submission order.
#[derive(Debug)]
pub struct Sequenced<J> {
    /// Submission order, starting at zero.
    pub seqno: u64,
    /// The caller's job.
    pub job: J,
}

/// Wraps a job-level conflict predicate so later jobs wait for earlier ones only.
#[derive(Debug, Clone, Copy)]
pub struct SequencedPolicy<F> {
    conflicts: F,
}

impl<F> SequencedPolicy<F> {
    /// Wrap `conflicts`.
    pub const fn new(conflicts: F) -> Self {
        Self { conflicts }
    }
}

impl<J, F> ConflictPolicy<Arc<Sequenced<J>>> for SequencedPolicy<F>
where
    F: Fn(&J, &J) -> bool + Send + Sync,
{
    fn conflicts(&self, job: &Arc<Sequenced<J>>, other: &Arc<Sequenced<J>>) -> bool {
        other.seqno < job.seqno && (self.conflicts)(&job.job, &other.job)
    }

    fn order(&self, a: &Arc<Sequenced<J>>, b: &Arc<Sequenced<J>>) -> CmpOrdering {
        a.seqno.cmp(&b.seqno)
    }
}

/// Queue type used by the pool.
pub type ApplyQueue<J, F> = JobQueue<Arc<Sequenced<J>>, SequencedPolicy<F>>;

/// A registered job on its way to a worker.
struct Dispatched<J> {
    slot: SlotHandle,
    job: Arc<Sequenced<J>>,
}

struct Dispatch<J> {
    tx: Option<Sender<Dispatched<J>>>,
    next_seqno: u64,
}

#[derive(Debug, Default)]
struct ApplyCounters {
    submitted: AtomicU64,
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Jobs submitted but not yet finished, with a condvar signaled when it reaches zero.
#[derive(Default)]
struct InFlight {
    pending: Mutex<u64>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.pending.lock() += 1;
    }

    fn finish(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.idle.wait(&mut pending);
        }
    }
}

/// Statistics about pool progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Jobs currently being applied.
    pub active: u64,
    /// Jobs applied successfully.
    pub completed: u64,
    /// Jobs whose executor returned an error or panicked.
    pub failed: u64,
    /// Snapshot of the underlying queue.
    pub queue: QueueStats,
}

/// Worker pool applying jobs in parallel while honoring conflicts in submission order.
pub struct ApplyPool<J, F, E>
where
    J: Send + Sync + 'static,
    F: Fn(&J, &J) -> bool + Send + Sync + 'static,
    E: JobExecutor<J>,
{
    config: ApplyPoolConfig,
    queue: Arc<ApplyQueue<J, F>>,
    dispatch: Mutex<Dispatch<J>>,
    counters: Arc<ApplyCounters>,
    in_flight: Arc<InFlight>,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    _executor: PhantomData<E>,
}

impl<J, F, E> ApplyPool<J, F, E>
where
    J: Send + Sync + 'static,
    F: Fn(&J, &J) -> bool + Send + Sync + 'static,
    E: JobExecutor<J>,
{
    /// Create the pool and spawn its workers.
    ///
    /// `conflicts(job, other)` says whether `job` must wait for an earlier `other`.
    ///
    /// # Errors
    ///
    /// - `ApplyError::InvalidConfig` if the configuration is invalid
    /// - `ApplyError::Spawn` if a worker thread can't be started
    pub fn new(config: ApplyPoolConfig, conflicts: F, executor: E) -> Result<Self, ApplyError> {
        config.validate().map_err(ApplyError::InvalidConfig)?;

        let queue = Arc::new(
            JobQueueBuilder::from_config(config.queue.clone())
                .build(SequencedPolicy::new(conflicts))?,
        );
        let (tx, rx) = bounded::<Dispatched<J>>(queue.capacity());
        let counters = Arc::new(ApplyCounters::default());
        let in_flight = Arc::new(InFlight::default());

        let worker_count = config.effective_workers();
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = spawn_worker(
                worker_id,
                rx.clone(),
                Arc::clone(&queue),
                Arc::clone(&counters),
                Arc::clone(&in_flight),
                executor.clone(),
                config.thread_stack_size,
            )
            .map_err(ApplyError::Spawn)?;
            workers.push(worker);
        }

        info!(
            worker_count,
            max_concurrent = queue.max_concurrent(),
            capacity = queue.capacity(),
            "apply pool initialized"
        );

        Ok(Self {
            config,
            queue,
            dispatch: Mutex::new(Dispatch {
                tx: Some(tx),
                next_seqno: 0,
            }),
            counters,
            in_flight,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
            _executor: PhantomData,
        })
    }

    /// Submit a job and return its sequence number. Never blocks on the job itself.
    ///
    /// # Errors
    ///
    /// - `ApplyError::Queue(QueueError::QueueFull)` if `capacity` jobs are in flight
    /// - `ApplyError::PoolShutdown` if the pool has been shut down
    pub fn submit(&self, job: J) -> Result<u64, ApplyError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ApplyError::PoolShutdown);
        }

        // Registration and dispatch happen in sequence order under this lock.
        let mut dispatch = self.dispatch.lock();
        let seqno = dispatch.next_seqno;
        let Some(tx) = dispatch.tx.as_ref() else {
            return Err(ApplyError::PoolShutdown);
        };

        let slot = self.queue.acquire_slot(self.config.kind)?;
        let job = Arc::new(Sequenced { seqno, job });
        if let Err(e) = self.queue.register(&slot, Arc::clone(&job)) {
            self.queue.release_slot(slot);
            return Err(e.into());
        }

        // The channel holds `capacity` messages and each one owns a slot, so this never blocks.
        self.in_flight.begin();
        if let Err(SendError(rejected)) = tx.send(Dispatched { slot, job }) {
            warn!(seqno, "apply workers gone, job rejected");
            self.queue.release_slot(rejected.slot);
            self.in_flight.finish();
            return Err(ApplyError::PoolShutdown);
        }

        dispatch.next_seqno += 1;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(seqno, "job submitted to apply pool");
        Ok(seqno)
    }

    /// Block until every submitted job has finished.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> ApplyStats {
        ApplyStats {
            worker_count: self.workers.lock().len(),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            queue: self.queue.stats(),
        }
    }

    /// Stop accepting jobs, let workers drain what was submitted, and join them.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down apply pool");
        self.dispatch.lock().tx = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(worker_id = idx, "apply worker panicked");
            }
        }

        info!(worker_count, "apply pool shut down complete");
    }
}

impl<J, F, E> Drop for ApplyPool<J, F, E>
where
    J: Send + Sync + 'static,
    F: Fn(&J, &J) -> bool + Send + Sync + 'static,
    E: JobExecutor<J>,
{
    fn drop(&mut self) {
        // Close the channel but don't join: explicit shutdown() is the graceful path.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.dispatch.lock().tx = None;
            debug!("ApplyPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker<J, F, E>(
    worker_id: usize,
    rx: Receiver<Dispatched<J>>,
    queue: Arc<ApplyQueue<J, F>>,
    counters: Arc<ApplyCounters>,
    in_flight: Arc<InFlight>,
    executor: E,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>>
where
    J: Send + Sync + 'static,
    F: Fn(&J, &J) -> bool + Send + Sync + 'static,
    E: JobExecutor<J>,
{
    thread::Builder::new()
        .name(format!("apply-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "apply worker started");

            // Sender dropped on shutdown: recv returns Err once the channel is drained.
            while let Ok(Dispatched { slot, job }) = rx.recv() {
                apply_one(worker_id, &queue, &counters, &executor, slot, &job);
                in_flight.finish();
            }

            debug!(worker_id, "apply worker exiting");
        })
}

fn apply_one<J, F, E>(
    worker_id: usize,
    queue: &ApplyQueue<J, F>,
    counters: &ApplyCounters,
    executor: &E,
    slot: SlotHandle,
    job: &Sequenced<J>,
) where
    J: Send + Sync + 'static,
    F: Fn(&J, &J) -> bool + Send + Sync + 'static,
    E: JobExecutor<J>,
{
    if let Err(e) = queue.start_registered(&slot) {
        error!(worker_id, seqno = job.seqno, error = %e, "failed to start job");
        counters.failed.fetch_add(1, Ordering::Relaxed);
        queue.release_slot(slot);
        return;
    }

    counters.active.fetch_add(1, Ordering::Relaxed);
    debug!(worker_id, seqno = job.seqno, slot = %slot.id(), "worker applying job");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.apply(job.seqno, &job.job)));
    match outcome {
        Ok(Ok(())) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            warn!(worker_id, seqno = job.seqno, error = %e, "job failed");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            error!(worker_id, seqno = job.seqno, "job panicked");
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    counters.active.fetch_sub(1, Ordering::Relaxed);

    if let Err(e) = queue.end(&slot) {
        error!(worker_id, seqno = job.seqno, error = %e, "failed to end job");
    }
    queue.release_slot(slot);
}
