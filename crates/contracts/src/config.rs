//! Processor configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default per-key channel capacity
pub const DEFAULT_MAX_CHANNEL_SIZE: usize = 1000;

/// Default name of the dispatch thread
pub const DEFAULT_THREAD_NAME: &str = "mqp-dispatch";

/// Multi-queue processor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProcessorConfig {
    /// Maximum number of pending values per key
    #[serde(default = "default_max_channel_size")]
    #[validate(range(min = 1, message = "max_channel_size must be >= 1"))]
    pub max_channel_size: usize,

    /// What the dispatch loop does between passes
    #[serde(default)]
    #[validate(custom(function = "validate_idle"))]
    pub idle: IdleStrategy,

    /// Dispatch thread name
    #[serde(default = "default_thread_name")]
    #[validate(length(min = 1, message = "thread_name must not be empty"))]
    pub thread_name: String,
}

fn default_max_channel_size() -> usize {
    DEFAULT_MAX_CHANNEL_SIZE
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_channel_size: DEFAULT_MAX_CHANNEL_SIZE,
            idle: IdleStrategy::default(),
            thread_name: default_thread_name(),
        }
    }
}

impl ProcessorConfig {
    /// Default config with a different channel capacity
    pub fn with_max_channel_size(max_channel_size: usize) -> Self {
        Self {
            max_channel_size,
            ..Self::default()
        }
    }

    /// Replace the idle strategy
    pub fn idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }
}

/// Idle behavior of the dispatch loop
///
/// Both strategies keep the one-value-per-key-per-pass rule; they only differ in
/// how the loop spends time between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IdleStrategy {
    /// Yield the CPU before every pass and poll again
    #[default]
    Yield,
    /// Park the dispatch thread after a pass that delivered nothing.
    /// Enqueue, subscribe and shutdown unpark it early.
    Park {
        /// Upper bound on a single park, in milliseconds
        #[serde(default = "default_park_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_park_timeout_ms() -> u64 {
    10
}

impl IdleStrategy {
    /// Park strategy with the given timeout, rounded up to whole milliseconds
    ///
    /// Never yields a zero timeout; anything shorter than 1 ms parks for 1 ms.
    pub fn park(timeout: Duration) -> Self {
        let timeout_ms = timeout.as_nanos().div_ceil(1_000_000).max(1);
        Self::Park {
            timeout_ms: u64::try_from(timeout_ms).unwrap_or(u64::MAX),
        }
    }

    /// Park timeout, `None` for the yield strategy
    pub fn park_timeout(&self) -> Option<Duration> {
        match self {
            Self::Yield => None,
            Self::Park { timeout_ms } => Some(Duration::from_millis(*timeout_ms)),
        }
    }
}

fn validate_idle(idle: &IdleStrategy) -> Result<(), ValidationError> {
    match idle {
        IdleStrategy::Park { timeout_ms: 0 } => {
            let mut err = ValidationError::new("park_timeout");
            err.message = Some("idle.timeout_ms must be > 0".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
