//! Tracing events for observability.
//!
//! Enabled by the `tracing` feature. The functions emit events whose field
//! names follow the `counter.*` / `gauge.*` / `histogram.*` convention so a
//! metrics layer (for example tracing-opentelemetry) can aggregate them.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("lane_thread_pool=trace".parse().unwrap()))
//!     .init();
//! ```

use crate::core::Priority;
use std::time::Duration;

/// Records a batch submission.
#[inline]
pub fn record_submission(handle_id: u64, priority: Priority, jobs: usize, dispatched: bool) {
    if dispatched {
        tracing::trace!(
            counter.batches_submitted = 1,
            handle_id = handle_id,
            lane = priority.name(),
            jobs = jobs as u64,
            "batch dispatched"
        );
    } else {
        tracing::trace!(
            counter.batches_submitted = 1,
            counter.batches_parked = 1,
            handle_id = handle_id,
            lane = priority.name(),
            jobs = jobs as u64,
            "batch parked"
        );
    }
}

/// Records job completion with timing.
#[inline]
pub fn record_completion(duration: Duration, success: bool) {
    let duration_ms = duration.as_millis() as u64;
    if success {
        tracing::trace!(
            counter.jobs_completed = 1,
            histogram.job_duration_ms = duration_ms,
            "job completed successfully"
        );
    } else {
        tracing::trace!(
            counter.jobs_failed = 1,
            histogram.job_duration_ms = duration_ms,
            "job failed"
        );
    }
}

/// Records worker becoming busy.
#[inline]
pub fn record_worker_busy(worker_id: usize) {
    tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
}

/// Records worker becoming idle.
#[inline]
pub fn record_worker_idle(worker_id: usize) {
    tracing::trace!(
        gauge.workers_busy = -1i64,
        worker_id = worker_id,
        "worker idle"
    );
}

/// Records pool startup.
#[inline]
pub fn record_pool_start(low_workers: usize, high_workers: usize) {
    tracing::info!(
        low_workers = low_workers,
        high_workers = high_workers,
        "thread pool started"
    );
}

/// Records pool shutdown.
#[inline]
pub fn record_pool_shutdown(jobs_completed: u64, jobs_failed: u64) {
    tracing::info!(
        jobs_completed = jobs_completed,
        jobs_failed = jobs_failed,
        "thread pool shutdown complete"
    );
}
