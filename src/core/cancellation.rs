//! Cooperative cancellation for job actions
//!
//! Worker threads are never killed. Each live worker thread owns a
//! [`CancellationToken`] that is handed to every action it runs; a forced stop
//! or a pool shutdown cancels the token, and long-running actions are expected
//! to poll it at safe points.
//!
//! # Example
//!
//! ```rust
//! use lane_thread_pool::{CancellationReason, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let observer = token.clone();
//!
//! token.cancel_with_reason(CancellationReason::BatchStopped(3));
//!
//! assert!(observer.is_cancelled());
//! assert_eq!(observer.reason(), Some(CancellationReason::BatchStopped(3)));
//! assert!(observer.check().is_err());
//! ```

use crate::core::Result;
use crate::ThreadError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via [`CancellationToken::cancel`]
    Manual,
    /// The batch with this identifier was stopped while the job was running
    BatchStopped(u64),
    /// The pool is shutting down
    Shutdown,
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::BatchStopped(id) => write!(f, "batch {} was stopped", id),
            CancellationReason::Shutdown => write!(f, "pool shutdown"),
        }
    }
}

type CancelCallback = Box<dyn FnOnce() + Send>;

struct CancellationTokenInner {
    cancelled: AtomicBool,
    reason: RwLock<Option<CancellationReason>>,
    callbacks: Mutex<Vec<CancelCallback>>,
}

/// A thread-safe cancellation flag shared between a worker thread and the
/// actions it executes
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancel with [`CancellationReason::Manual`]
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel with a specific reason
    ///
    /// Only the first cancellation is recorded; registered callbacks run once,
    /// on the cancelling thread.
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        // Record the reason before publishing the flag so observers never see
        // a cancelled token without one
        {
            let mut slot = self.inner.reason.write();
            if self.inner.cancelled.load(Ordering::Acquire) {
                return;
            }
            *slot = Some(reason);
            self.inner.cancelled.store(true, Ordering::Release);
        }

        let callbacks: Vec<_> = self.inner.callbacks.lock().drain(..).collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Check if cancellation has been requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Get the cancellation reason, if cancelled
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns `Err(ThreadError::Cancelled)` once cancelled
    ///
    /// Convenient inside actions: `token.check()?;`
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            let reason = self
                .reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(ThreadError::cancelled("job", reason))
        } else {
            Ok(())
        }
    }

    /// Register a callback to run on cancellation
    ///
    /// Runs immediately if the token is already cancelled.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.inner.callbacks.lock();
            if !self.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
