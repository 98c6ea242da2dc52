//! Core types for the lane thread pool

pub mod cancellation;
pub mod error;
pub mod job;
pub mod priority;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{Result, ThreadError};
pub use job::{CompletionCallback, Job, JobAction};
pub use priority::Priority;
