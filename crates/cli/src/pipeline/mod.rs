//! Pipeline orchestration module.

mod orchestrator;
mod stats;
mod tracking;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::{PipelineStats, StreamStats};
pub use tracking::{Sample, TrackingConsumer};
