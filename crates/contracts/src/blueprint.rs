//! ProcessorBlueprint - Config Loader output
//!
//! Describes a processor and the synthetic streams the CLI drives through it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::ProcessorConfig;

/// Channel key of a configured stream
///
/// Producers clone the key on every enqueue, so it is shared rather than
/// owned.
pub type StreamKey = Arc<str>;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Processor settings
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Streams (one key, one producer, one consumer each)
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

/// One keyed stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Channel key
    pub key: StreamKey,

    /// Producer rate (enqueue ticks per second)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Values enqueued per tick
    #[serde(default = "default_burst")]
    pub burst: usize,

    /// Consumer subscribed to the key
    #[serde(default)]
    pub consumer: ConsumerKind,

    /// Delay before the consumer is subscribed, in milliseconds.
    /// Values enqueued before that wait in the channel.
    #[serde(default)]
    pub subscribe_delay_ms: u64,

    /// Consumer-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_rate_hz() -> f64 {
    100.0
}

fn default_burst() -> usize {
    1
}

/// Consumer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    /// Log every value via tracing
    Log,
    /// Keep values in memory (counted in the run summary)
    #[default]
    Collect,
    /// Append values to a JSON lines file (`params.path`)
    JsonLines,
}

impl ProcessorBlueprint {
    /// Stream configuration by key
    pub fn stream(&self, key: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| &*s.key == key)
    }

    /// Total configured producer rate in values per second
    pub fn offered_load(&self) -> f64 {
        self.streams
            .iter()
            .map(|s| s.rate_hz * s.burst as f64)
            .sum()
    }
}
