//! Batch handler: one scheduling request tracked to joint completion

use crate::core::error::panic_message;
use crate::core::{CompletionCallback, Job, Priority, Result, ThreadError};
use crate::pool::job_handler::JobHandler;
use crossbeam_queue::SegQueue;
use log::error;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The action returned an error
    Error,
    /// The action panicked
    Panic,
}

/// A failed job of a batch
///
/// Failed jobs still count toward the batch total; this record is how the
/// failure is surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// Position of the job inside its batch
    pub job_id: usize,
    /// Name of the job
    pub job_name: String,
    /// Error return or panic
    pub kind: FailureKind,
    /// Error or panic message
    pub message: String,
}

impl JobFailure {
    fn from_error(job_id: usize, job_name: &str, err: &ThreadError) -> Self {
        let (kind, message) = match err {
            ThreadError::JobPanic { message, .. } => (FailureKind::Panic, message.clone()),
            ThreadError::ExecutionError { message, .. } => (FailureKind::Error, message.clone()),
            other => (FailureKind::Error, other.to_string()),
        };
        Self {
            job_id,
            job_name: job_name.to_string(),
            kind,
            message,
        }
    }
}

struct BatchCallback {
    fired: bool,
    callback: Option<CompletionCallback>,
}

/// Completion bookkeeping shared by a batch and all of its job handlers
pub(crate) struct BatchProgress {
    handle_id: u64,
    total: usize,
    executed: AtomicUsize,
    cancelled: AtomicBool,
    failures: Mutex<Vec<JobFailure>>,
    callback: Mutex<BatchCallback>,
    finished_lock: Mutex<()>,
    finished: Condvar,
}

impl BatchProgress {
    fn new(handle_id: u64, total: usize) -> Self {
        Self {
            handle_id,
            total,
            executed: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
            callback: Mutex::new(BatchCallback {
                // An empty batch is done on arrival
                fired: total == 0,
                callback: None,
            }),
            finished_lock: Mutex::new(()),
            finished: Condvar::new(),
        }
    }

    /// Record one completed job; returns true for the completion that
    /// finished the batch.
    pub(crate) fn notify(&self, job_id: usize, job_name: &str, outcome: &Result<()>) -> bool {
        if let Err(err) = outcome {
            self.failures
                .lock()
                .push(JobFailure::from_error(job_id, job_name, err));
        }

        let executed = self.executed.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(executed <= self.total, "batch completed more jobs than it holds");
        if executed != self.total {
            return false;
        }

        self.signal_finished();
        if !self.is_cancelled() {
            self.fire_callback();
        }
        true
    }

    fn is_done(&self) -> bool {
        self.executed.load(Ordering::Acquire) >= self.total
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn signal_finished(&self) {
        let _guard = self.finished_lock.lock();
        self.finished.notify_all();
    }

    fn fire_callback(&self) {
        let callback = {
            let mut slot = self.callback.lock();
            slot.fired = true;
            slot.callback.take()
        };

        if let Some(callback) = callback {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                error!(
                    "Batch {} completion callback panicked: {}",
                    self.handle_id,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// A batch of jobs created from one scheduling request
///
/// Jobs are dispatched in submission order. [`count`](Self::count) reports
/// jobs not yet handed to a worker, while [`executed`](Self::executed) counts
/// jobs that have finished; the two differ while jobs are in flight.
///
/// # Example
///
/// ```rust
/// use lane_thread_pool::prelude::*;
///
/// let handler = Handler::new(1, Priority::Low, vec![
///     Job::new("a", || Ok(())),
///     Job::new("b", || Ok(())),
/// ]);
///
/// assert_eq!(handler.total(), 2);
/// assert_eq!(handler.dequeue().map(|j| j.name().to_string()), Some("a".to_string()));
/// assert_eq!(handler.count(), 1);
/// assert!(handler.in_progress());
/// ```
pub struct Handler {
    id: u64,
    priority: Priority,
    queue: SegQueue<JobHandler>,
    progress: Arc<BatchProgress>,
}

impl Handler {
    /// Build a batch, wrapping each job in a [`JobHandler`]
    pub fn new(id: u64, priority: Priority, jobs: impl IntoIterator<Item = Job>) -> Self {
        let jobs: Vec<Job> = jobs.into_iter().collect();
        let progress = Arc::new(BatchProgress::new(id, jobs.len()));
        let queue = SegQueue::new();
        for (index, job) in jobs.into_iter().enumerate() {
            queue.push(JobHandler::new(index, id, job, Arc::clone(&progress)));
        }

        Self {
            id,
            priority,
            queue,
            progress,
        }
    }

    /// Pool-wide batch identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Lane this batch runs in
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Pop the next undispatched job
    ///
    /// Safe to call from several threads at once. Returns `None` when every
    /// job has been dispatched or the batch was cancelled.
    pub fn dequeue(&self) -> Option<JobHandler> {
        if self.is_cancelled() {
            return None;
        }
        self.queue.pop()
    }

    /// Number of jobs not yet dispatched
    pub fn count(&self) -> usize {
        self.queue.len()
    }

    /// Number of jobs in the batch
    pub fn total(&self) -> usize {
        self.progress.total
    }

    /// Number of jobs that have completed, successfully or not
    pub fn executed(&self) -> usize {
        self.progress.executed.load(Ordering::Acquire)
    }

    /// Every job has completed
    pub fn is_done(&self) -> bool {
        self.progress.is_done()
    }

    /// The batch was stopped before finishing
    pub fn is_cancelled(&self) -> bool {
        self.progress.is_cancelled()
    }

    /// Done or cancelled; nothing more will happen to this batch
    pub fn is_finished(&self) -> bool {
        self.is_done() || self.is_cancelled()
    }

    /// True while jobs are still outstanding
    pub fn in_progress(&self) -> bool {
        !self.is_finished()
    }

    /// Fraction of jobs completed, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.total() == 0 {
            1.0
        } else {
            self.executed() as f64 / self.total() as f64
        }
    }

    /// Failures recorded so far
    pub fn failures(&self) -> Vec<JobFailure> {
        self.progress.failures.lock().clone()
    }

    /// Whether any job failed
    pub fn has_failures(&self) -> bool {
        !self.progress.failures.lock().is_empty()
    }

    /// Register the batch completion callback
    ///
    /// The callback runs exactly once, on the thread that completes the last
    /// job, or immediately on the calling thread if the batch is already done.
    /// Registering again before completion replaces the previous callback.
    /// Cancelled batches never fire it.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slot = self.progress.callback.lock();
            if !slot.fired {
                slot.callback = Some(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Block until the batch is done or cancelled; returns [`is_done`](Self::is_done)
    pub fn wait(&self) -> bool {
        let mut guard = self.progress.finished_lock.lock();
        while !self.is_finished() {
            self.progress.finished.wait(&mut guard);
        }
        self.is_done()
    }

    /// Block for at most `timeout`; returns true if the batch finished
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.progress.finished_lock.lock();
        while !self.is_finished() {
            if self
                .progress
                .finished
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.is_finished();
            }
        }
        true
    }

    /// Mark the batch cancelled and drop its undispatched jobs
    ///
    /// Returns how many jobs were abandoned.
    pub(crate) fn cancel(&self) -> usize {
        if self.progress.cancelled.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let mut abandoned = 0;
        while self.queue.pop().is_some() {
            abandoned += 1;
        }
        self.progress.signal_finished();
        abandoned
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("total", &self.total())
            .field("executed", &self.executed())
            .field("undispatched", &self.count())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
