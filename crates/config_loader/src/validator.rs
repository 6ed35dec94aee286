//! Config validation
//!
//! Rules:
//! - processor settings pass their field constraints
//! - stream keys are unique and non-empty
//! - rate_hz > 0, burst >= 1
//! - json_lines streams have a `path` param

use std::collections::HashSet;

use contracts::{ConsumerKind, ContractError, ProcessorBlueprint};
use validator::Validate;

/// Validate a ProcessorBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    validate_processor(blueprint)?;
    validate_stream_keys(blueprint)?;
    validate_stream_rates(blueprint)?;
    validate_consumers(blueprint)?;
    Ok(())
}

fn validate_processor(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    blueprint
        .processor
        .validate()
        .map_err(|e| ContractError::from(e).within("processor"))
}

/// Stream keys must be unique
fn validate_stream_keys(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, stream) in blueprint.streams.iter().enumerate() {
        if stream.key.is_empty() {
            return Err(ContractError::config_validation(
                format!("streams[{idx}].key"),
                "stream key cannot be empty",
            ));
        }
        if !seen.insert(&*stream.key) {
            return Err(ContractError::config_validation(
                format!("streams[key={}]", stream.key),
                "duplicate stream key",
            ));
        }
    }
    Ok(())
}

fn validate_stream_rates(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    for stream in &blueprint.streams {
        if !stream.rate_hz.is_finite() || stream.rate_hz <= 0.0 {
            return Err(ContractError::config_validation(
                format!("streams[{}].rate_hz", stream.key),
                format!("rate_hz must be > 0, got {}", stream.rate_hz),
            ));
        }
        if stream.burst == 0 {
            return Err(ContractError::config_validation(
                format!("streams[{}].burst", stream.key),
                "burst must be >= 1",
            ));
        }
    }
    Ok(())
}

fn validate_consumers(blueprint: &ProcessorBlueprint) -> Result<(), ContractError> {
    for stream in &blueprint.streams {
        if stream.consumer == ConsumerKind::JsonLines
            && stream.params.get("path").is_none_or(|p| p.is_empty())
        {
            return Err(ContractError::config_validation(
                format!("streams[{}].params.path", stream.key),
                "json_lines consumer requires a non-empty path",
            ));
        }
    }
    Ok(())
}
