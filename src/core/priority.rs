//! Priority lanes
//!
//! Every batch is submitted with a [`Priority`], and every worker belongs to
//! exactly one lane. A batch is only ever serviced by workers of its own lane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority lane of a batch or a worker
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    /// Background work; the default lane
    #[default]
    Low,
    /// Latency-sensitive work with its own reserved workers
    High,
}

impl Priority {
    /// Lanes in the order the pump services them
    pub const DISPATCH_ORDER: [Priority; 2] = [Priority::High, Priority::Low];

    /// Lowercase lane name used in thread names and logs
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::High => write!(f, "High"),
        }
    }
}
