//! Consumer implementations
//!
//! Contains LogConsumer, JsonLinesConsumer, and CollectingConsumer.

mod collect;
mod json_lines;
mod log;

pub use self::collect::CollectingConsumer;
pub use self::json_lines::{JsonLinesConfig, JsonLinesConsumer};
pub use self::log::LogConsumer;
