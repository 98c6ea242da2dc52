//! Worker thread implementation
//!
//! A worker owns at most one OS thread. The thread is spawned lazily when work
//! arrives, waits on a condition variable between jobs, and exits after the
//! idle timeout. Forced stops never kill a thread: the live thread's
//! generation is retired and its cancellation token is cancelled, and a fresh
//! thread takes over.

use crate::core::error::panic_message;
use crate::core::{CancellationReason, CancellationToken, Priority, Result, ThreadError};
use crate::pool::handler::Handler;
use crate::pool::job_handler::JobHandler;
use crossbeam_channel::Sender;
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    /// No live thread
    Sleeping,
    /// Thread alive and waiting for work
    Idling,
    /// Thread executing a job
    Working,
}

/// Point-in-time view of a worker for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    /// Worker index inside the pool
    pub index: usize,
    /// Display name, e.g. `Worker 3 (High)`
    pub name: String,
    /// Lane of the worker
    pub priority: Priority,
    /// Current state
    pub state: WorkerState,
    /// Seconds spent idling since the last job (0 unless idling)
    pub idle_elapsed_secs: f64,
    /// Name of the job being executed, if any
    pub current_job: Option<String>,
    /// Seconds spent on the current job, or on the last one when idle
    pub current_job_elapsed_secs: f64,
}

/// Timing knobs shared by all workers of a pool
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerTiming {
    pub poll_interval: Duration,
    pub idle_timeout: Duration,
    pub join_timeout: Duration,
}

/// Completion record sent from a worker thread to the pool's pump
#[derive(Debug)]
pub(crate) struct Completion {
    pub worker: usize,
    pub priority: Priority,
    pub handle_id: u64,
    pub job_id: usize,
    pub job_name: String,
    pub elapsed: Duration,
    pub failure: Option<String>,
    pub batch_done: bool,
}

struct Assignment {
    handler: Arc<Handler>,
    job: JobHandler,
}

struct WorkerSlot {
    state: WorkerState,
    handler: Option<Arc<Handler>>,
    assigned: Option<Assignment>,
    current_job: Option<String>,
    idle_since: Option<Instant>,
    job_started: Option<Instant>,
    last_job_elapsed: Duration,
    /// Identifies the live thread; bumped whenever a thread is retired or spawned
    generation: u64,
    /// The live thread has finished executing and is completing its job
    completing: bool,
    thread_alive: bool,
    token: CancellationToken,
}

struct WorkerShared {
    slot: Mutex<WorkerSlot>,
    wakeup: Condvar,
}

struct ThreadContext {
    index: usize,
    priority: Priority,
    generation: u64,
    token: CancellationToken,
    shared: Arc<WorkerShared>,
    relay: Sender<Completion>,
    timing: WorkerTiming,
}

/// One managed worker thread bound to a priority lane
pub struct Worker {
    index: usize,
    priority: Priority,
    name: String,
    thread_name: String,
    timing: WorkerTiming,
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
    retired: Vec<JoinHandle<()>>,
    relay: Sender<Completion>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("priority", &self.priority)
            .field("state", &self.state())
            .finish()
    }
}

impl Worker {
    /// Create a sleeping worker; no thread is started until work arrives
    pub(crate) fn new(
        index: usize,
        priority: Priority,
        thread_name_prefix: &str,
        timing: WorkerTiming,
        relay: Sender<Completion>,
    ) -> Self {
        Self {
            index,
            priority,
            name: format!("Worker {} ({})", index, priority),
            thread_name: format!("{}-{}-{}", thread_name_prefix, priority.name(), index),
            timing,
            shared: Arc::new(WorkerShared {
                slot: Mutex::new(WorkerSlot {
                    state: WorkerState::Sleeping,
                    handler: None,
                    assigned: None,
                    current_job: None,
                    idle_since: None,
                    job_started: None,
                    last_job_elapsed: Duration::ZERO,
                    generation: 0,
                    completing: false,
                    thread_alive: false,
                    token: CancellationToken::new(),
                }),
                wakeup: Condvar::new(),
            }),
            thread: None,
            retired: Vec::new(),
            relay,
        }
    }

    /// Worker index inside the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// Lane this worker serves
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        self.shared.slot.lock().state
    }

    /// No batch assigned; ready for [`enqueue`](Self::enqueue)
    pub fn is_available(&self) -> bool {
        let slot = self.shared.slot.lock();
        slot.handler.is_none() && slot.state != WorkerState::Working
    }

    /// Whether an OS thread is currently attached to this worker
    pub fn is_thread_alive(&self) -> bool {
        self.shared.slot.lock().thread_alive
    }

    /// Identifier of the batch whose job this worker holds
    pub fn current_handle_id(&self) -> Option<u64> {
        self.shared.slot.lock().handler.as_ref().map(|h| h.id())
    }

    /// Take the next job of `handler` and start working on it
    ///
    /// Starts (or restarts) the thread if none is alive. Returns `Ok(false)`
    /// when the handler had nothing left to dispatch or the worker is busy.
    pub fn enqueue(&mut self, handler: &Arc<Handler>) -> Result<bool> {
        self.reap_retired();

        let shared = Arc::clone(&self.shared);
        let mut slot = shared.slot.lock();
        if slot.handler.is_some() {
            return Ok(false);
        }

        if !slot.thread_alive {
            self.spawn_thread(&mut slot)?;
        }

        let job = match handler.dequeue() {
            Some(job) => job,
            None => {
                if slot.state == WorkerState::Sleeping {
                    slot.state = WorkerState::Idling;
                }
                slot.idle_since.get_or_insert_with(Instant::now);
                return Ok(false);
            }
        };

        debug!(
            "{}: assigned job '{}' ({})",
            self.name,
            job.name(),
            job.key()
        );

        slot.current_job = Some(job.name().to_string());
        slot.handler = Some(Arc::clone(handler));
        slot.assigned = Some(Assignment {
            handler: Arc::clone(handler),
            job,
        });
        slot.state = WorkerState::Working;
        slot.idle_since = None;
        slot.job_started = None;
        shared.wakeup.notify_all();

        Ok(true)
    }

    /// Forced stop of the current batch
    ///
    /// Discards the current job, retires the live thread (its token is
    /// cancelled and its result, if any, is dropped) and immediately starts a
    /// fresh thread in the idle state. Returns the batch that was dropped, or
    /// `None` if the worker held no batch or its job is already completing.
    pub fn dequeue(&mut self) -> Option<Arc<Handler>> {
        let shared = Arc::clone(&self.shared);
        let mut slot = shared.slot.lock();
        if slot.completing {
            return None;
        }
        let handler = slot.handler.take()?;

        slot.generation += 1;
        slot.assigned = None;
        slot.current_job = None;
        slot.job_started = None;
        slot.state = WorkerState::Idling;
        slot.idle_since = Some(Instant::now());
        slot.thread_alive = false;
        let retired_token = slot.token.clone();
        shared.wakeup.notify_all();

        if let Err(e) = self.spawn_thread(&mut slot) {
            warn!(
                "{}: could not restart thread after stopping batch {}: {}",
                self.name,
                handler.id(),
                e
            );
            slot.state = WorkerState::Sleeping;
            slot.idle_since = None;
        }
        drop(slot);

        retired_token.cancel_with_reason(CancellationReason::BatchStopped(handler.id()));
        debug!("{}: stopped batch {}", self.name, handler.id());

        Some(handler)
    }

    /// Stop the worker: cancel its thread and join it with a bounded wait
    ///
    /// A batch whose job was dropped is cancelled.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(handler) = self.request_stop() {
            handler.cancel();
        }
        self.join_threads()
    }

    /// Signal the live thread to exit without waiting for it
    ///
    /// Returns the batch whose job was dropped. A job that is already
    /// completing finishes normally and its batch is not returned.
    pub(crate) fn request_stop(&mut self) -> Option<Arc<Handler>> {
        let (token, dropped) = {
            let mut slot = self.shared.slot.lock();
            let handler = slot.handler.take();
            let dropped = if slot.completing { None } else { handler };
            slot.completing = false;
            slot.generation += 1;
            slot.assigned = None;
            slot.current_job = None;
            slot.job_started = None;
            slot.idle_since = None;
            slot.state = WorkerState::Sleeping;
            slot.thread_alive = false;
            self.shared.wakeup.notify_all();
            (slot.token.clone(), dropped)
        };
        token.cancel_with_reason(CancellationReason::Shutdown);
        dropped
    }

    /// Join the current and retired threads, each within the join timeout
    pub(crate) fn join_threads(&mut self) -> Result<()> {
        let mut result = Ok(());
        let handles: Vec<_> = self.thread.take().into_iter().chain(self.retired.drain(..)).collect();
        for handle in handles {
            if let Err(e) = join_with_timeout(self.index, handle, self.timing.join_timeout) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Diagnostics snapshot
    pub fn snapshot(&self) -> WorkerSnapshot {
        let slot = self.shared.slot.lock();
        let idle_elapsed = match (slot.state, slot.idle_since) {
            (WorkerState::Idling, Some(since)) => since.elapsed(),
            _ => Duration::ZERO,
        };
        let job_elapsed = slot
            .job_started
            .map(|started| started.elapsed())
            .unwrap_or(slot.last_job_elapsed);

        WorkerSnapshot {
            index: self.index,
            name: self.name.clone(),
            priority: self.priority,
            state: slot.state,
            idle_elapsed_secs: idle_elapsed.as_secs_f64(),
            current_job: slot.current_job.clone(),
            current_job_elapsed_secs: job_elapsed.as_secs_f64(),
        }
    }

    fn spawn_thread(&mut self, slot: &mut WorkerSlot) -> Result<()> {
        slot.generation += 1;
        slot.token = CancellationToken::new();

        let context = ThreadContext {
            index: self.index,
            priority: self.priority,
            generation: slot.generation,
            token: slot.token.clone(),
            shared: Arc::clone(&self.shared),
            relay: self.relay.clone(),
            timing: self.timing,
        };

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || Self::run(context))
            .map_err(|e| {
                ThreadError::spawn_with_source(self.index, "failed to start worker thread", e)
            })?;

        slot.thread_alive = true;
        if let Some(previous) = self.thread.replace(handle) {
            self.retired.push(previous);
        }
        Ok(())
    }

    fn reap_retired(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.retired.drain(..).partition(|h| h.is_finished());
        self.retired = running;
        for handle in finished {
            if let Err(e) = join_with_timeout(self.index, handle, Duration::ZERO) {
                warn!("{}: {}", self.name, e);
            }
        }
    }

    /// Main worker loop
    fn run(context: ThreadContext) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(
            Level::DEBUG,
            "worker",
            index = context.index,
            lane = context.priority.name()
        );
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!(
            "Worker {}: thread started (generation {})",
            context.index, context.generation
        );

        while let Some(Assignment { handler, mut job }) = Self::next_assignment(&context) {
            #[cfg(feature = "tracing")]
            crate::telemetry::record_worker_busy(context.index);

            let key = job.key();
            let started = Instant::now();
            let outcome = match catch_unwind(AssertUnwindSafe(|| job.execute(&context.token))) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!("Worker {}: job '{}' failed: {}", context.index, job.name(), e);
                    Err(ThreadError::execution(&key, e.to_string()))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        "Worker {}: job '{}' panicked: {}",
                        context.index,
                        job.name(),
                        message
                    );
                    Err(ThreadError::job_panic(&key, message))
                }
            };
            let elapsed = started.elapsed();

            #[cfg(feature = "tracing")]
            crate::telemetry::record_completion(elapsed, outcome.is_ok());

            {
                // Claim the completion; a forced stop after this point leaves the job alone
                let mut slot = context.shared.slot.lock();
                if slot.generation != context.generation {
                    debug!(
                        "Worker {}: discarding result of '{}' from a stopped batch",
                        context.index,
                        job.name()
                    );
                    return;
                }
                slot.completing = true;
            }

            let job_id = job.id();
            let job_name = job.name().to_string();
            let failure = outcome.as_ref().err().map(|e| e.to_string());
            let batch_done = match job.complete(&outcome) {
                Ok(done) => done,
                Err(e) => {
                    error!("Worker {}: {}", context.index, e);
                    handler.is_done()
                }
            };

            {
                let mut slot = context.shared.slot.lock();
                if slot.generation == context.generation {
                    slot.completing = false;
                    slot.state = WorkerState::Idling;
                    slot.handler = None;
                    slot.current_job = None;
                    slot.job_started = None;
                    slot.last_job_elapsed = elapsed;
                    slot.idle_since = Some(Instant::now());
                }
            }

            #[cfg(feature = "tracing")]
            crate::telemetry::record_worker_idle(context.index);

            // The receiver is gone once the pool has shut down
            let _ = context.relay.send(Completion {
                worker: context.index,
                priority: context.priority,
                handle_id: handler.id(),
                job_id,
                job_name,
                elapsed,
                failure,
                batch_done,
            });
        }

        debug!(
            "Worker {}: thread exiting (generation {})",
            context.index, context.generation
        );
    }

    /// Wait for the next job; `None` means this thread must exit
    fn next_assignment(context: &ThreadContext) -> Option<Assignment> {
        let mut slot = context.shared.slot.lock();
        loop {
            if slot.generation != context.generation {
                return None;
            }

            if let Some(assignment) = slot.assigned.take() {
                slot.job_started = Some(Instant::now());
                return Some(assignment);
            }

            let idle_for = slot
                .idle_since
                .map(|since| since.elapsed())
                .unwrap_or(Duration::ZERO);
            if slot.state == WorkerState::Idling && idle_for >= context.timing.idle_timeout {
                slot.state = WorkerState::Sleeping;
                slot.thread_alive = false;
                slot.idle_since = None;
                debug!(
                    "Worker {}: idle for {:?}, releasing thread",
                    context.index, idle_for
                );
                return None;
            }

            let remaining = context.timing.idle_timeout.saturating_sub(idle_for);
            let wait = context.timing.poll_interval.min(remaining.max(Duration::from_millis(1)));
            context.shared.wakeup.wait_for(&mut slot, wait);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_none() && self.retired.is_empty() {
            return;
        }
        if let Err(e) = self.stop() {
            error!("{}: failed to stop during drop: {}", self.name, e);
        }
    }
}

/// Join a thread, giving up after `timeout`
fn join_with_timeout(index: usize, handle: JoinHandle<()>, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            return handle.join().map_err(|payload| {
                ThreadError::join(
                    index,
                    format!("worker thread panicked: {}", panic_message(payload.as_ref())),
                )
            });
        }

        if start.elapsed() >= timeout {
            // Dropping the handle detaches the thread; it exits at its next
            // cancellation check.
            return Err(ThreadError::join(
                index,
                format!(
                    "did not finish within {}ms; thread detached",
                    timeout.as_millis()
                ),
            ));
        }

        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Job;
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn timing(idle_timeout_ms: u64) -> WorkerTiming {
        WorkerTiming {
            poll_interval: Duration::from_millis(5),
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            join_timeout: Duration::from_secs(2),
        }
    }

    fn test_worker(idle_timeout_ms: u64) -> (Worker, Receiver<Completion>) {
        let (tx, rx) = unbounded();
        let worker = Worker::new(0, Priority::Low, "test", timing(idle_timeout_ms), tx);
        (worker, rx)
    }

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_worker_starts_sleeping() {
        let (worker, _rx) = test_worker(10_000);
        assert_eq!(worker.state(), WorkerState::Sleeping);
        assert!(!worker.is_thread_alive());
        assert!(worker.is_available());
        assert_eq!(worker.name(), "Worker 0 (Low)");
    }

    #[test]
    fn test_worker_job_execution() {
        let (mut worker, rx) = test_worker(10_000);
        let handler = Arc::new(Handler::new(
            1,
            Priority::Low,
            vec![Job::new("compute", || Ok(()))],
        ));

        assert!(worker.enqueue(&handler).expect("enqueue"));
        assert!(worker.is_thread_alive());

        let completion = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("completion relayed");
        assert_eq!(completion.handle_id, 1);
        assert_eq!(completion.job_name, "compute");
        assert!(completion.batch_done);
        assert!(completion.failure.is_none());

        assert!(handler.is_done());
        assert!(wait_until(Duration::from_secs(1), || worker.state()
            == WorkerState::Idling));
        assert!(worker.is_available());

        worker.stop().expect("stop");
    }

    #[test]
    fn test_worker_idle_timeout_releases_thread() {
        let (mut worker, rx) = test_worker(40);
        let handler = Arc::new(Handler::new(1, Priority::Low, vec![Job::new("a", || Ok(()))]));

        worker.enqueue(&handler).expect("enqueue");
        rx.recv_timeout(Duration::from_secs(2)).expect("first completion");

        assert!(wait_until(Duration::from_secs(2), || worker.state()
            == WorkerState::Sleeping));
        assert!(!worker.is_thread_alive());

        // Resurrected by the next enqueue
        let handler = Arc::new(Handler::new(2, Priority::Low, vec![Job::new("b", || Ok(()))]));
        assert!(worker.enqueue(&handler).expect("enqueue again"));
        let completion = rx.recv_timeout(Duration::from_secs(2)).expect("second completion");
        assert_eq!(completion.handle_id, 2);

        worker.stop().expect("stop");
    }

    #[test]
    fn test_worker_forced_stop() {
        let (mut worker, rx) = test_worker(10_000);
        let started = Arc::new(AtomicBool::new(false));
        let observed_cancel = Arc::new(AtomicBool::new(false));

        let started_clone = Arc::clone(&started);
        let observed_clone = Arc::clone(&observed_cancel);
        let handler = Arc::new(Handler::new(
            5,
            Priority::Low,
            vec![Job::cancellable("spin", move |token| {
                started_clone.store(true, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                observed_clone.store(true, Ordering::SeqCst);
                Ok(())
            })],
        ));

        worker.enqueue(&handler).expect("enqueue");
        assert!(wait_until(Duration::from_secs(2), || started.load(Ordering::SeqCst)));
        assert_eq!(worker.current_handle_id(), Some(5));

        let dropped = worker.dequeue().expect("worker held a batch");
        assert_eq!(dropped.id(), 5);

        // Back to idling immediately, with a fresh thread polling
        assert_eq!(worker.state(), WorkerState::Idling);
        assert!(worker.is_available());
        assert!(worker.is_thread_alive());
        assert!(wait_until(Duration::from_secs(1), || observed_cancel
            .load(Ordering::SeqCst)));

        // The abandoned result is never completed or relayed
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(handler.executed(), 0);

        // Dequeue without a batch is a no-op
        assert!(worker.dequeue().is_none());

        worker.stop().expect("stop");
    }

    #[test]
    fn test_forced_stop_leaves_completing_job_alone() {
        let (mut worker, rx) = test_worker(10_000);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handler = Arc::new(Handler::new(
            3,
            Priority::Low,
            vec![Job::new("finishing", || Ok(())).with_on_complete(move || {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
            })],
        ));

        worker.enqueue(&handler).expect("enqueue");
        entered_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("job reached its completion callback");

        assert!(worker.dequeue().is_none());
        assert_eq!(worker.current_handle_id(), Some(3));

        drop(release_tx);
        let completion = rx.recv_timeout(Duration::from_secs(2)).expect("completion");
        assert!(completion.batch_done);
        assert!(handler.is_done());
        assert!(!handler.is_cancelled());

        worker.stop().expect("stop");
    }

    #[test]
    fn test_stop_cancels_the_dropped_batch() {
        let (mut worker, _rx) = test_worker(10_000);
        let started = Arc::new(AtomicBool::new(false));
        let started_clone = Arc::clone(&started);
        let handler = Arc::new(Handler::new(
            4,
            Priority::Low,
            vec![Job::cancellable("until-stopped", move |token| {
                started_clone.store(true, Ordering::SeqCst);
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(2));
                }
                Ok(())
            })],
        ));

        worker.enqueue(&handler).expect("enqueue");
        assert!(wait_until(Duration::from_secs(2), || started.load(Ordering::SeqCst)));

        worker.stop().expect("stop");
        assert!(handler.is_cancelled());
        assert!(!handler.in_progress());
        assert!(handler.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_worker_survives_panics_and_errors() {
        let (mut worker, rx) = test_worker(10_000);
        let handler = Arc::new(Handler::new(
            1,
            Priority::Low,
            vec![
                Job::new("panics", || panic!("Intentional panic for testing")),
                Job::new("errors", || Err(ThreadError::other("bad input"))),
                Job::new("fine", || Ok(())),
            ],
        ));

        for _ in 0..3 {
            assert!(wait_until(Duration::from_secs(2), || worker.is_available()));
            assert!(worker.enqueue(&handler).expect("enqueue"));
            rx.recv_timeout(Duration::from_secs(2)).expect("completion");
        }

        assert!(handler.is_done());
        let failures = handler.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].job_name, "panics");
        assert_eq!(failures[0].kind, crate::pool::FailureKind::Panic);
        assert_eq!(failures[1].job_name, "errors");

        worker.stop().expect("stop");
    }

    #[test]
    fn test_worker_snapshot_reports_current_job() {
        let (mut worker, rx) = test_worker(10_000);
        let release = Arc::new(AtomicBool::new(false));
        let release_clone = Arc::clone(&release);
        let handler = Arc::new(Handler::new(
            1,
            Priority::Low,
            vec![Job::new("long-load", move || {
                while !release_clone.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(2));
                }
                Ok(())
            })],
        ));

        worker.enqueue(&handler).expect("enqueue");
        let snapshot = worker.snapshot();
        assert_eq!(snapshot.state, WorkerState::Working);
        assert_eq!(snapshot.current_job.as_deref(), Some("long-load"));
        assert_eq!(snapshot.idle_elapsed_secs, 0.0);

        release.store(true, Ordering::SeqCst);
        rx.recv_timeout(Duration::from_secs(2)).expect("completion");
        assert!(wait_until(Duration::from_secs(1), || worker.snapshot().current_job.is_none()));

        worker.stop().expect("stop");
    }

    #[test]
    fn test_worker_stop_is_idempotent() {
        let (mut worker, _rx) = test_worker(10_000);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let handler = Arc::new(Handler::new(
            1,
            Priority::Low,
            vec![Job::new("x", move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })],
        ));
        worker.enqueue(&handler).expect("enqueue");

        worker.stop().expect("first stop");
        worker.stop().expect("second stop");
        assert_eq!(worker.state(), WorkerState::Sleeping);
        assert!(!worker.is_thread_alive());
    }
}
