//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Processor configuration rejected
    #[error("invalid processor config: {0}")]
    InvalidConfig(#[from] contracts::ContractError),

    /// Dispatch thread could not be started
    #[error("failed to spawn dispatch thread '{thread_name}': {source}")]
    Spawn {
        thread_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Consumer creation error
    #[error("failed to create consumer '{name}': {message}")]
    ConsumerCreation { name: String, message: String },
}

impl DispatcherError {
    /// Create a consumer creation error
    pub fn consumer_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
