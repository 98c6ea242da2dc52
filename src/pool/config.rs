//! Pool configuration and lane sizing

use crate::core::{Result, ThreadError};
use crate::pool::worker::WorkerTiming;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Share of the usable processors the pool may occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PerformanceProfile {
    /// 25 %
    #[default]
    Low,
    /// 50 %
    Medium,
    /// 75 %
    High,
    /// 100 %
    Max,
}

impl PerformanceProfile {
    /// Percentage of usable processors
    pub fn percent(&self) -> usize {
        match self {
            PerformanceProfile::Low => 25,
            PerformanceProfile::Medium => 50,
            PerformanceProfile::High => 75,
            PerformanceProfile::Max => 100,
        }
    }
}

/// Number of workers per lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneSizes {
    /// Workers serving [`Priority::Low`](crate::Priority::Low)
    pub low: usize,
    /// Workers serving [`Priority::High`](crate::Priority::High)
    pub high: usize,
}

impl LaneSizes {
    /// Split a thread count into lanes
    ///
    /// | threads | low     | high |
    /// |---------|---------|------|
    /// | 1       | 1       | 0    |
    /// | 2..=6   | n - 1   | 1    |
    /// | 7..=10  | n - 2   | 2    |
    /// | > 10    | n - 3   | 3    |
    pub fn for_thread_count(threads: usize) -> Result<Self> {
        let high = match threads {
            0 => {
                return Err(ThreadError::invalid_config(
                    "max_threads",
                    "The number of threads in the thread pool must be greater than zero",
                ))
            }
            1 => 0,
            2..=6 => 1,
            7..=10 => 2,
            _ => 3,
        };
        Ok(Self {
            low: threads - high,
            high,
        })
    }

    /// Total workers across both lanes
    pub fn total(&self) -> usize {
        self.low + self.high
    }
}

/// Configuration for [`ThreadPool`](crate::ThreadPool)
///
/// Serializes to camelCase JSON:
///
/// ```rust
/// use lane_thread_pool::{PerformanceProfile, PoolConfig};
///
/// let config = PoolConfig::from_json(r#"{
///     "multithreadingEnabled": true,
///     "performanceProfile": "Max",
///     "idleTimeoutMs": 2000,
///     "processorCount": 8
/// }"#).unwrap();
///
/// assert_eq!(config.performance_profile, PerformanceProfile::Max);
/// assert_eq!(config.poll_interval_ms, 16);
/// assert_eq!(config.max_threads(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// When false the pool runs exactly one low-priority worker
    pub multithreading_enabled: bool,
    /// Share of usable processors to occupy
    pub performance_profile: PerformanceProfile,
    /// Idle time after which a worker releases its thread.
    /// Default: 10 000 ms
    pub idle_timeout_ms: u64,
    /// Worker wake-up cadence and expected tick cadence.
    /// Default: 16 ms
    pub poll_interval_ms: u64,
    /// Bounded wait when joining worker threads on shutdown.
    /// Default: 5 000 ms
    pub join_timeout_ms: u64,
    /// Thread name prefix, also used as the pool name in errors
    pub thread_name_prefix: String,
    /// Override of the detected hardware concurrency
    pub processor_count: Option<usize>,
    /// Explicit lane sizes, bypassing the profile-based split
    pub lane_sizes: Option<LaneSizes>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            multithreading_enabled: true,
            performance_profile: PerformanceProfile::default(),
            idle_timeout_ms: 10_000,
            poll_interval_ms: 16,
            join_timeout_ms: 5_000,
            thread_name_prefix: "lane-worker".to_string(),
            processor_count: None,
            lane_sizes: None,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ThreadError::invalid_config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Enable or disable multithreading
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_multithreading(mut self, enabled: bool) -> Self {
        self.multithreading_enabled = enabled;
        self
    }

    /// Set the performance profile
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_performance_profile(mut self, profile: PerformanceProfile) -> Self {
        self.performance_profile = profile;
        self
    }

    /// Set the idle timeout
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the poll interval
    ///
    /// # Trade-offs
    ///
    /// - **Shorter intervals**: faster idle detection, more wake-ups
    /// - **Longer intervals**: fewer wake-ups, coarser idle timeout
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the join timeout used on shutdown
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Pretend the host has `count` processors
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_processor_count(mut self, count: usize) -> Self {
        self.processor_count = Some(count);
        self
    }

    /// Use fixed lane sizes instead of the profile-based split
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_lane_sizes(mut self, low: usize, high: usize) -> Self {
        self.lane_sizes = Some(LaneSizes { low, high });
        self
    }

    /// Idle timeout as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Join timeout as a duration
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Processors available to the pool: hardware concurrency minus one for
    /// the driving thread and one for the OS
    pub fn usable_threads(&self) -> usize {
        self.processor_count
            .unwrap_or_else(num_cpus::get)
            .saturating_sub(2)
    }

    /// Thread count after applying the performance profile
    pub fn max_threads(&self) -> usize {
        if !self.multithreading_enabled {
            return 1;
        }
        match self.lane_sizes {
            Some(lanes) => lanes.total(),
            None => self.performance_profile.percent() * self.usable_threads() / 100,
        }
    }

    /// Resolve the per-lane worker counts
    pub fn resolve_lanes(&self) -> Result<LaneSizes> {
        if !self.multithreading_enabled {
            return Ok(LaneSizes { low: 1, high: 0 });
        }
        match self.lane_sizes {
            Some(lanes) if lanes.total() == 0 => Err(ThreadError::invalid_config(
                "lane_sizes",
                "at least one worker is required",
            )),
            Some(lanes) => Ok(lanes),
            None => LaneSizes::for_thread_count(self.max_threads()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ThreadError::invalid_config(
                "poll_interval_ms",
                "poll interval must be non-zero",
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ThreadError::invalid_config(
                "idle_timeout_ms",
                "idle timeout must be non-zero",
            ));
        }
        self.resolve_lanes().map(|_| ())
    }

    pub(crate) fn worker_timing(&self) -> WorkerTiming {
        WorkerTiming {
            poll_interval: self.poll_interval(),
            idle_timeout: self.idle_timeout(),
            join_timeout: self.join_timeout(),
        }
    }
}
