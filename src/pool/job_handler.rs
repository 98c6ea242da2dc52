//! Single-job wrapper executed by a worker

use crate::core::error::panic_message;
use crate::core::{CancellationToken, Job, Result, ThreadError};
use crate::pool::handler::BatchProgress;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// One job of a batch, together with the batch's completion notifier
///
/// A worker calls [`execute`](Self::execute) and then
/// [`complete`](Self::complete) back-to-back on its own thread. `complete`
/// consumes the handler, so a job can never be counted twice.
pub struct JobHandler {
    id: usize,
    handle_id: u64,
    job: Job,
    notifier: Arc<BatchProgress>,
}

impl JobHandler {
    pub(crate) fn new(id: usize, handle_id: u64, job: Job, notifier: Arc<BatchProgress>) -> Self {
        Self {
            id,
            handle_id,
            job,
            notifier,
        }
    }

    /// Position of this job inside its batch (0-based, submission order)
    pub fn id(&self) -> usize {
        self.id
    }

    /// Identifier of the owning batch
    pub fn handle_id(&self) -> u64 {
        self.handle_id
    }

    /// Name of the wrapped job
    pub fn name(&self) -> &str {
        self.job.name()
    }

    /// The wrapped job
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// `"<batch>#<job>"`, used as the job id in errors and logs
    pub fn key(&self) -> String {
        format!("{}#{}", self.handle_id, self.id)
    }

    /// Run the job's action synchronously on the calling thread
    pub fn execute(&mut self, token: &CancellationToken) -> Result<()> {
        self.job.run(token)
    }

    /// Mark the job complete and notify the batch
    ///
    /// The batch is always notified, even when the job's own completion
    /// callback panics; that panic is returned as
    /// [`ThreadError::CallbackPanic`]. On success, returns whether this
    /// completion finished the batch.
    pub fn complete(mut self, outcome: &Result<()>) -> Result<bool> {
        let callback = catch_unwind(AssertUnwindSafe(|| self.job.complete()));
        let batch_done = self.notifier.notify(self.id, self.job.name(), outcome);

        match callback {
            Ok(()) => Ok(batch_done),
            Err(payload) => Err(ThreadError::callback_panic(
                self.job.name(),
                panic_message(payload.as_ref()),
            )),
        }
    }
}

impl fmt::Debug for JobHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandler")
            .field("id", &self.id)
            .field("handle_id", &self.handle_id)
            .field("job", &self.job)
            .finish()
    }
}
