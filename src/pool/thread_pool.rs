//! Thread pool implementation

use crate::core::{Job, Priority, Result, ThreadError};
use crate::pool::config::{LaneSizes, PoolConfig};
use crate::pool::handler::Handler;
use crate::pool::worker::{Completion, Worker, WorkerSnapshot, WorkerState};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of the whole pool for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
    /// All workers
    pub worker_count: usize,
    /// Workers without a live thread
    pub sleep_count: usize,
    /// Workers waiting for work
    pub idle_count: usize,
    /// Workers executing a job
    pub busy_count: usize,
    /// Jobs waiting in pending batches plus jobs being executed
    pub total_jobs: usize,
    /// Jobs waiting in pending batches
    pub pending_jobs: usize,
    /// Pending batches in the low lane
    pub pending_low: usize,
    /// Pending batches in the high lane
    pub pending_high: usize,
    /// Jobs completed since start, failures included
    pub jobs_completed: u64,
    /// Jobs whose action failed since start
    pub jobs_failed: u64,
    /// Per-worker details
    pub workers: Vec<WorkerSnapshot>,
}

/// Batches waiting for capacity, one queue per lane, in insertion order
#[derive(Debug, Default)]
struct PendingSets {
    low: VecDeque<Arc<Handler>>,
    high: VecDeque<Arc<Handler>>,
}

impl PendingSets {
    fn lane(&self, priority: Priority) -> &VecDeque<Arc<Handler>> {
        match priority {
            Priority::Low => &self.low,
            Priority::High => &self.high,
        }
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<Arc<Handler>> {
        match priority {
            Priority::Low => &mut self.low,
            Priority::High => &mut self.high,
        }
    }

    fn remove(&mut self, identifier: u64) -> Option<Arc<Handler>> {
        for priority in Priority::DISPATCH_ORDER {
            let lane = self.lane_mut(priority);
            if let Some(position) = lane.iter().position(|h| h.id() == identifier) {
                return lane.remove(position);
            }
        }
        None
    }

    fn drain(&mut self) -> impl Iterator<Item = Arc<Handler>> + '_ {
        self.high.drain(..).chain(self.low.drain(..))
    }
}

/// Lane-partitioned worker pool driven by an external tick
///
/// The pool is owned by a single driver: submission, cancellation and the
/// periodic [`tick`](Self::tick) take `&mut self`. Worker threads report
/// completions through an internal channel that `tick` drains.
///
/// # Example
///
/// ```rust
/// use lane_thread_pool::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let config = PoolConfig::new().with_lane_sizes(2, 1);
/// let mut pool = ThreadPool::with_config(config)?;
/// pool.start()?;
///
/// let jobs = vec![
///     pool.create("parse", || Ok(())),
///     pool.create("index", || Ok(())),
/// ];
/// let handler = pool.handle(jobs, Priority::Low)?;
///
/// assert!(pool.wait_for(&handler, Duration::from_secs(5)));
/// pool.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct ThreadPool {
    config: PoolConfig,
    lanes: LaneSizes,
    workers: Vec<Worker>,
    pending: PendingSets,
    relay_tx: Sender<Completion>,
    relay_rx: Receiver<Completion>,
    handle_counter: u64,
    running: bool,
    jobs_completed: u64,
    jobs_failed: u64,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("lanes", &self.lanes)
            .field("running", &self.running)
            .field("pending_low", &self.pending.low.len())
            .field("pending_high", &self.pending.high.len())
            .finish()
    }
}

impl ThreadPool {
    /// Create a thread pool with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Create a thread pool with custom configuration
    ///
    /// Fails with [`ThreadError::InvalidConfig`] when the configuration
    /// resolves to no workers.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let lanes = config.resolve_lanes()?;
        let (relay_tx, relay_rx) = unbounded();

        Ok(Self {
            config,
            lanes,
            workers: Vec::new(),
            pending: PendingSets::default(),
            relay_tx,
            relay_rx,
            handle_counter: 0,
            running: false,
            jobs_completed: 0,
            jobs_failed: 0,
        })
    }

    /// Start the pool: build the lane-partitioned workers
    ///
    /// Workers begin asleep; threads are spawned when work arrives. The pool
    /// can be started again after [`shutdown`](Self::shutdown).
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(ThreadError::already_running(
                &self.config.thread_name_prefix,
                self.workers.len(),
            ));
        }

        let timing = self.config.worker_timing();
        let lanes = [
            (Priority::Low, self.lanes.low),
            (Priority::High, self.lanes.high),
        ];
        let mut workers = Vec::with_capacity(self.lanes.total());
        for (priority, count) in lanes {
            for _ in 0..count {
                let index = workers.len();
                workers.push(Worker::new(
                    index,
                    priority,
                    &self.config.thread_name_prefix,
                    timing,
                    self.relay_tx.clone(),
                ));
            }
        }

        self.workers = workers;
        self.running = true;

        info!(
            "Thread pool '{}' started: {} low / {} high workers",
            self.config.thread_name_prefix, self.lanes.low, self.lanes.high
        );
        #[cfg(feature = "tracing")]
        crate::telemetry::record_pool_start(self.lanes.low, self.lanes.high);

        Ok(())
    }

    /// Create a job; no side effects
    pub fn create<S, F>(&self, name: S, action: F) -> Job
    where
        S: Into<String>,
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Job::new(name, action)
    }

    /// Submit a batch of jobs in the given lane
    ///
    /// The batch gets a fresh identifier ([`Handler::id`]). If the lane has
    /// no pending batches the jobs are dispatched to free workers right away;
    /// whatever does not fit parks the whole batch until a later
    /// [`tick`](Self::tick). A batch never jumps ahead of earlier pending
    /// batches of the same lane.
    pub fn handle(
        &mut self,
        jobs: impl IntoIterator<Item = Job>,
        priority: Priority,
    ) -> Result<Arc<Handler>> {
        if !self.running {
            return Err(ThreadError::not_running(&self.config.thread_name_prefix));
        }

        self.handle_counter += 1;
        let handler = Arc::new(Handler::new(self.handle_counter, priority, jobs));
        if handler.total() == 0 {
            return Ok(handler);
        }

        if self.lane_worker_count(priority) == 0 {
            warn!(
                "Batch {} submitted to the {} lane, which has no workers; it stays pending",
                handler.id(),
                priority
            );
        }

        let dispatched = self.pending.lane(priority).is_empty() && self.dispatch(&handler);
        if dispatched {
            debug!(
                "Batch {} ({} jobs, {}) dispatched",
                handler.id(),
                handler.total(),
                priority
            );
        } else {
            debug!(
                "Batch {} ({} jobs, {}) parked with {} undispatched",
                handler.id(),
                handler.total(),
                priority,
                handler.count()
            );
            self.pending
                .lane_mut(priority)
                .push_back(Arc::clone(&handler));
        }

        #[cfg(feature = "tracing")]
        crate::telemetry::record_submission(handler.id(), priority, handler.total(), dispatched);

        Ok(handler)
    }

    /// Submit a single job as its own batch
    pub fn handle_job(&mut self, job: Job, priority: Priority) -> Result<Arc<Handler>> {
        self.handle(std::iter::once(job), priority)
    }

    /// Stop the batch with this identifier
    ///
    /// A pending batch is removed and none of its remaining jobs run. Workers
    /// executing one of its jobs are force-stopped and return to idling.
    /// Unknown identifiers are ignored.
    pub fn stop(&mut self, identifier: u64) {
        if let Some(handler) = self.pending.remove(identifier) {
            let abandoned = handler.cancel();
            debug!(
                "Batch {} removed from pending, {} jobs abandoned",
                identifier, abandoned
            );
        }

        for worker in &mut self.workers {
            if worker.current_handle_id() != Some(identifier) {
                continue;
            }
            if let Some(handler) = worker.dequeue() {
                handler.cancel();
            }
        }
    }

    /// Periodic pump; call once per host tick
    ///
    /// Drains the completion relay, then retries pending batches, high lane
    /// first, each lane in insertion order. The first batch of a lane that
    /// cannot be fully dispatched stays at the front and ends that lane's
    /// pass for this tick.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.drain_completions();

        for priority in Priority::DISPATCH_ORDER {
            self.retry_pending(priority);
        }
    }

    /// Drive the pool until `handler` finishes or `timeout` elapses
    ///
    /// Ticks on the poll cadence. Returns whether the batch is done.
    pub fn wait_for(&mut self, handler: &Handler, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if handler.is_finished() {
                return handler.is_done();
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            handler.wait_timeout(self.config.poll_interval().min(deadline - now));
        }
    }

    /// Stop every worker and drop all pending work
    ///
    /// Pending batches and batches with a job in flight are cancelled, so no
    /// handler is left in progress. Safe to call with jobs in flight and safe
    /// to call repeatedly. Worker
    /// threads are cancelled and joined with a bounded wait; threads still
    /// busy after the join timeout are detached and logged.
    pub fn shutdown(&mut self) {
        if !self.running && self.workers.is_empty() {
            return;
        }
        self.running = false;

        for handler in self.pending.drain() {
            handler.cancel();
        }

        for worker in &mut self.workers {
            if let Some(handler) = worker.request_stop() {
                handler.cancel();
            }
        }
        for worker in &mut self.workers {
            if let Err(e) = worker.join_threads() {
                warn!("Thread pool '{}': {}", self.config.thread_name_prefix, e);
            }
        }

        self.drain_completions();
        self.workers.clear();

        info!(
            "Thread pool '{}' shut down: {} jobs completed, {} failed",
            self.config.thread_name_prefix, self.jobs_completed, self.jobs_failed
        );
        #[cfg(feature = "tracing")]
        crate::telemetry::record_pool_shutdown(self.jobs_completed, self.jobs_failed);
    }

    /// Whether the pool is started
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The configuration in use
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Resolved lane sizes
    pub fn lane_sizes(&self) -> LaneSizes {
        self.lanes
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers in a lane
    pub fn lane_worker_count(&self, priority: Priority) -> usize {
        match priority {
            Priority::Low => self.lanes.low,
            Priority::High => self.lanes.high,
        }
    }

    /// Workers currently in `state`
    pub fn count_in_state(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state() == state).count()
    }

    /// Workers of a lane currently in `state`
    pub fn lane_count_in_state(&self, priority: Priority, state: WorkerState) -> usize {
        self.workers
            .iter()
            .filter(|w| w.priority() == priority && w.state() == state)
            .count()
    }

    /// Sleeping workers
    pub fn sleep_worker_count(&self) -> usize {
        self.count_in_state(WorkerState::Sleeping)
    }

    /// Idling workers
    pub fn idle_worker_count(&self) -> usize {
        self.count_in_state(WorkerState::Idling)
    }

    /// Working workers
    pub fn busy_worker_count(&self) -> usize {
        self.count_in_state(WorkerState::Working)
    }

    /// Workers with a live OS thread
    pub fn live_thread_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_thread_alive()).count()
    }

    /// Pending batches in a lane
    pub fn pending_count(&self, priority: Priority) -> usize {
        self.pending.lane(priority).len()
    }

    /// Pending batches across lanes
    pub fn pending_batches(&self) -> usize {
        self.pending.low.len() + self.pending.high.len()
    }

    /// Undispatched jobs held by pending batches
    pub fn pending_jobs(&self) -> usize {
        self.pending
            .low
            .iter()
            .chain(self.pending.high.iter())
            .map(|h| h.count())
            .sum()
    }

    /// Pending jobs plus jobs being executed
    pub fn total_jobs(&self) -> usize {
        self.pending_jobs() + self.busy_worker_count()
    }

    /// Jobs completed since start, as seen by the pump
    pub fn total_jobs_completed(&self) -> u64 {
        self.jobs_completed
    }

    /// Jobs whose action failed since start, as seen by the pump
    pub fn total_jobs_failed(&self) -> u64 {
        self.jobs_failed
    }

    /// Snapshot of one worker
    pub fn worker_snapshot(&self, index: usize) -> Option<WorkerSnapshot> {
        self.workers.get(index).map(|w| w.snapshot())
    }

    /// Snapshots of all workers
    pub fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        self.workers.iter().map(|w| w.snapshot()).collect()
    }

    /// Snapshot of the whole pool
    pub fn snapshot(&self) -> PoolSnapshot {
        let workers = self.worker_snapshots();
        let count = |state: WorkerState| workers.iter().filter(|w| w.state == state).count();
        let busy_count = count(WorkerState::Working);
        let pending_jobs = self.pending_jobs();

        PoolSnapshot {
            taken_at: Utc::now(),
            worker_count: workers.len(),
            sleep_count: count(WorkerState::Sleeping),
            idle_count: count(WorkerState::Idling),
            busy_count,
            total_jobs: pending_jobs + busy_count,
            pending_jobs,
            pending_low: self.pending.low.len(),
            pending_high: self.pending.high.len(),
            jobs_completed: self.jobs_completed,
            jobs_failed: self.jobs_failed,
            workers,
        }
    }

    /// Hand jobs of `handler` to free workers of its lane until it is empty
    /// or the lane has no free worker; returns whether it was fully dispatched
    fn dispatch(&mut self, handler: &Arc<Handler>) -> bool {
        let priority = handler.priority();
        while handler.count() > 0 {
            let worker = self
                .workers
                .iter_mut()
                .find(|w| w.priority() == priority && w.is_available());

            let Some(worker) = worker else {
                return false;
            };

            match worker.enqueue(handler) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(
                        "Batch {}: {}; retrying on a later tick",
                        handler.id(),
                        e
                    );
                    return false;
                }
            }
        }
        true
    }

    fn retry_pending(&mut self, priority: Priority) {
        while let Some(handler) = self.pending.lane(priority).front().cloned() {
            if handler.is_cancelled() {
                self.pending.lane_mut(priority).pop_front();
                continue;
            }
            if !self.dispatch(&handler) {
                break;
            }
            self.pending.lane_mut(priority).pop_front();
            debug!("Pending batch {} ({}) dispatched", handler.id(), priority);
        }
    }

    fn drain_completions(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(completion) = self.relay_rx.try_recv() {
            drained += 1;
            self.jobs_completed += 1;
            if let Some(failure) = &completion.failure {
                self.jobs_failed += 1;
                warn!(
                    "Batch {} job {} '{}' on worker {} ({}) failed after {:?}: {}",
                    completion.handle_id,
                    completion.job_id,
                    completion.job_name,
                    completion.worker,
                    completion.priority,
                    completion.elapsed,
                    failure
                );
            }
            if completion.batch_done {
                debug!("Batch {} complete", completion.handle_id);
            }
        }
        drained
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.running || !self.workers.is_empty() {
            self.shutdown();
        }
    }
}
