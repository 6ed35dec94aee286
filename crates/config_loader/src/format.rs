//! File formats a blueprint can be written in

use std::path::Path;

use contracts::{ContractError, ProcessorBlueprint};

/// Configuration file format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format of `path`, from its extension (case-insensitive)
    pub fn of_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ContractError::config_parse(format!(
                "unsupported config format: .{other}"
            ))),
            None => Err(ContractError::config_parse(format!(
                "{} has no extension; expected .toml or .json",
                path.display()
            ))),
        }
    }

    /// Deserialize without validating
    pub fn parse(self, content: &str) -> Result<ProcessorBlueprint, ContractError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| self.parse_error(e)),
            Self::Json => serde_json::from_str(content).map_err(|e| self.parse_error(e)),
        }
    }

    fn parse_error<E>(self, error: E) -> ContractError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContractError::ConfigParse {
            message: format!("{self:?} parse error: {error}"),
            source: Some(Box::new(error)),
        }
    }
}
