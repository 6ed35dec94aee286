//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use config_loader::{ConfigLoader, Overrides};
use contracts::ProcessorBlueprint;

use crate::error::{CliError, Result};

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load a blueprint with `overrides` applied, checking the file exists first
pub(crate) fn load_blueprint(path: &Path, overrides: Overrides) -> Result<ProcessorBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(ConfigLoader::with_overrides(overrides).load(path)?)
}
