//! Job type: a named unit of work with an optional completion callback

use crate::core::cancellation::CancellationToken;
use crate::core::error::Result;
use std::fmt;

/// Boxed job action; receives the cancellation token of the executing worker
pub type JobAction = Box<dyn FnOnce(&CancellationToken) -> Result<()> + Send + 'static>;

/// Boxed callback invoked when a job completes
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A named unit of work
///
/// Jobs are plain values: creating one has no side effects. A job is handed to
/// the pool inside a batch, and the pool completes it exactly once.
///
/// # Example
///
/// ```rust
/// use lane_thread_pool::Job;
///
/// let mut job = Job::new("decode-texture", || Ok(()))
///     .with_on_complete(|| println!("texture ready"));
///
/// assert_eq!(job.name(), "decode-texture");
/// assert!(!job.is_completed());
///
/// job.complete();
/// assert!(job.is_completed());
/// ```
pub struct Job {
    name: String,
    action: Option<JobAction>,
    completed: bool,
    on_complete: Option<CompletionCallback>,
}

impl Job {
    /// Create a job from an action that ignores cancellation
    pub fn new<S, F>(name: S, action: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self::cancellable(name, move |_token: &CancellationToken| action())
    }

    /// Create a job whose action observes the worker's cancellation token
    pub fn cancellable<S, F>(name: S, action: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&CancellationToken) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Some(Box::new(action)),
            completed: false,
            on_complete: None,
        }
    }

    /// Attach a completion callback
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Replace the completion callback
    pub fn set_on_complete<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// The job's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`complete`](Self::complete) has run
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Run the action once
    pub(crate) fn run(&mut self, token: &CancellationToken) -> Result<()> {
        match self.action.take() {
            Some(action) => action(token),
            None => Err(crate::core::ThreadError::other(format!(
                "Job '{}' already executed - cannot execute twice",
                self.name
            ))),
        }
    }

    /// Mark the job completed, then invoke the completion callback
    ///
    /// A panic raised by the callback is not caught here; it unwinds into
    /// whoever completes the job. Calling this more than once is a no-op.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("completed", &self.completed)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}
