//! # Lane Thread Pool
//!
//! A frame-driven job scheduler with two priority lanes of worker threads.
//!
//! ## Features
//!
//! - **Priority lanes**: Low and High workers never steal each other's work
//! - **Batches**: Jobs are submitted as a [`Handler`] that tracks joint completion
//! - **Lazy threads**: Workers sleep without a thread and release it after an idle timeout
//! - **Forced stop**: A running batch can be stopped; its workers return to idling immediately
//! - **Tick pump**: Completions and pending batches are processed by [`ThreadPool::tick`]
//!
//! ## Quick Start
//!
//! ```rust
//! use lane_thread_pool::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let mut pool = ThreadPool::with_config(PoolConfig::new().with_lane_sizes(4, 1))?;
//! pool.start()?;
//!
//! let processed = Arc::new(AtomicUsize::new(0));
//! let jobs: Vec<Job> = (0..10)
//!     .map(|i| {
//!         let processed = Arc::clone(&processed);
//!         pool.create(format!("job-{}", i), move || {
//!             processed.fetch_add(1, Ordering::Relaxed);
//!             Ok(())
//!         })
//!     })
//!     .collect();
//!
//! let handler = pool.handle(jobs, Priority::Low)?;
//! handler.on_complete(|| println!("batch finished"));
//!
//! // Normally called once per frame by the host loop
//! while handler.in_progress() {
//!     pool.tick();
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! assert_eq!(processed.load(Ordering::Relaxed), 10);
//!
//! pool.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use lane_thread_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = PoolConfig::new()
//!     .with_performance_profile(PerformanceProfile::Max)
//!     .with_processor_count(8)
//!     .with_idle_timeout(Duration::from_secs(5))
//!     .with_thread_name_prefix("loader");
//!
//! let pool = ThreadPool::with_config(config)?;
//! assert_eq!(pool.lane_sizes().total(), 6);
//! # Ok(())
//! # }
//! ```
//!
//! ## Cooperative Cancellation
//!
//! Jobs built with [`Job::cancellable`] receive a [`CancellationToken`] that
//! is cancelled when their batch is stopped or the pool shuts down.
//!
//! ```rust
//! use lane_thread_pool::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let mut pool = ThreadPool::with_config(PoolConfig::new().with_lane_sizes(1, 1))?;
//! pool.start()?;
//!
//! let job = Job::cancellable("stream", |token| {
//!     while !token.is_cancelled() {
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//!     Ok(())
//! });
//! let handler = pool.handle_job(job, Priority::High)?;
//!
//! pool.stop(handler.id());
//! assert!(handler.is_cancelled());
//! # pool.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;

#[cfg(feature = "tracing")]
pub mod telemetry;

pub use crate::core::{CancellationReason, CancellationToken, Job, Priority, Result, ThreadError};
pub use crate::pool::{
    FailureKind, Handler, JobFailure, JobHandler, LaneSizes, PerformanceProfile, PoolConfig,
    PoolSnapshot, ThreadPool, Worker, WorkerSnapshot, WorkerState,
};
