//! Thread pool, workers and batch handlers

pub mod config;
pub mod handler;
pub mod job_handler;
pub mod thread_pool;
pub mod worker;

pub use config::{LaneSizes, PerformanceProfile, PoolConfig};
pub use handler::{FailureKind, Handler, JobFailure};
pub use job_handler::JobHandler;
pub use thread_pool::{PoolSnapshot, ThreadPool};
pub use worker::{Worker, WorkerSnapshot, WorkerState};
