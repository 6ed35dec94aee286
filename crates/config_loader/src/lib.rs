//! # Config Loader
//!
//! Turns a TOML/JSON file into a validated `ProcessorBlueprint`.
//!
//! Command-line overrides are applied between parsing and validation, so an
//! override is held to the same rules as the file it replaces.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, Overrides};
//! use std::path::Path;
//!
//! let loader = ConfigLoader::with_overrides(Overrides {
//!     max_channel_size: Some(64),
//!     ..Default::default()
//! });
//! let blueprint = loader.load(Path::new("mqp.toml")).unwrap();
//! assert_eq!(blueprint.processor.max_channel_size, 64);
//! ```

mod format;
mod validator;

pub use contracts::ProcessorBlueprint;
pub use format::ConfigFormat;

use contracts::{ContractError, IdleStrategy, ProcessorConfig};
use std::path::Path;
use tracing::debug;

/// Processor settings that take precedence over the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub max_channel_size: Option<usize>,
    pub idle: Option<IdleStrategy>,
    pub thread_name: Option<String>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, processor: &mut ProcessorConfig) {
        if let Some(max_channel_size) = self.max_channel_size {
            processor.max_channel_size = max_channel_size;
        }
        if let Some(idle) = self.idle {
            processor.idle = idle;
        }
        if let Some(thread_name) = &self.thread_name {
            processor.thread_name.clone_from(thread_name);
        }
    }
}

/// Configuration loader
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: Overrides) -> Self {
        Self { overrides }
    }

    /// Read, parse, override and validate `path`
    ///
    /// # Errors
    /// - Unsupported or missing extension
    /// - File read failure
    /// - Parse failure
    /// - Validation failure, overrides included
    pub fn load(&self, path: &Path) -> Result<ProcessorBlueprint, ContractError> {
        let format = ConfigFormat::of_path(path)?;
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content, format)
    }

    /// Parse, override and validate in-memory content
    pub fn load_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProcessorBlueprint, ContractError> {
        let mut blueprint = format.parse(content)?;

        if !self.overrides.is_empty() {
            debug!(overrides = ?self.overrides, "Applying processor overrides");
            self.overrides.apply(&mut blueprint.processor);
        }

        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
