//! # Dispatcher
//!
//! Keyed multi-queue processor.
//!
//! Responsibilities:
//! - Keep one bounded FIFO channel per key, dropping the oldest value when full
//! - Keep one consumer per key, replaceable at any time
//! - Run one dispatch thread that hands each key's oldest value to its consumer,
//!   one value per key per pass

pub mod channel;
pub mod consumers;
pub mod error;
pub mod metrics;
pub mod processor;
pub mod registry;

pub use channel::{Channel, ChannelStore};
pub use consumers::{CollectingConsumer, JsonLinesConfig, JsonLinesConsumer, LogConsumer};
pub use contracts::{Consumer, IdleStrategy, ProcessorConfig};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, ProcessorMetrics};
pub use processor::MultiQueueProcessor;
pub use registry::ConsumerRef;
