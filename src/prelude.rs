//! Convenient re-exports for common types

pub use crate::core::{CancellationReason, CancellationToken, Job, Priority, Result, ThreadError};
pub use crate::pool::{
    Handler, JobFailure, PerformanceProfile, PoolConfig, PoolSnapshot, ThreadPool, WorkerState,
};
