//! Error types for the lane thread pool

use std::any::Any;

/// Result type for thread pool operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur in the thread pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// Thread pool is already running with details
    #[error("Thread pool '{pool_name}' is already running with {worker_count} workers")]
    AlreadyRunning {
        /// Name of the thread pool
        pool_name: String,
        /// Number of workers
        worker_count: usize,
    },

    /// Thread pool is not running
    #[error("Thread pool '{pool_name}' is not running")]
    NotRunning {
        /// Name of the thread pool
        pool_name: String,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// Index of the worker whose thread failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// Index of the worker whose thread failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Job action returned an error
    #[error("Job execution failed (job_id: {job_id}): {message}")]
    ExecutionError {
        /// ID of the failed job
        job_id: String,
        /// Error message
        message: String,
    },

    /// Job action panicked
    #[error("Job panicked (job_id: {job_id}): {message}")]
    JobPanic {
        /// ID of the panicked job
        job_id: String,
        /// Panic message
        message: String,
    },

    /// A completion callback panicked
    #[error("Completion callback of job '{job_name}' panicked: {message}")]
    CallbackPanic {
        /// Name of the job whose callback panicked
        job_name: String,
        /// Panic message
        message: String,
    },

    /// Job was cancelled with reason
    #[error("Job cancelled (job_id: {job_id}): {reason}")]
    Cancelled {
        /// ID of the cancelled job
        job_id: String,
        /// Reason for cancellation
        reason: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl ThreadError {
    /// Create an already running error
    pub fn already_running(pool_name: impl Into<String>, worker_count: usize) -> Self {
        ThreadError::AlreadyRunning {
            pool_name: pool_name.into(),
            worker_count,
        }
    }

    /// Create a not running error
    pub fn not_running(pool_name: impl Into<String>) -> Self {
        ThreadError::NotRunning {
            pool_name: pool_name.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::ExecutionError {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a job panic error
    pub fn job_panic(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::JobPanic {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a callback panic error
    pub fn callback_panic(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::CallbackPanic {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ThreadError::Cancelled {
            job_id: job_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ThreadError::Other(msg.into())
    }

    /// Returns true for errors raised by a job's action (error return or panic)
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            ThreadError::ExecutionError { .. } | ThreadError::JobPanic { .. }
        )
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
