//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - Producers enqueue values tagged with a key
//! - One consumer per key receives values in per-key FIFO order
//! - Channels are bounded; a full channel drops its oldest value

mod blueprint;
mod config;
mod consumer;
mod error;

pub use blueprint::*;
pub use config::*;
pub use consumer::Consumer;
pub use error::*;
