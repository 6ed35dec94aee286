//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;
use contracts::{ConsumerKind, ProcessorBlueprint};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    max_channel_size: usize,
    stream_count: usize,
    offered_load: f64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(&args.config, Default::default()) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                max_channel_size: blueprint.processor.max_channel_size,
                stream_count: blueprint.streams.len(),
                offered_load: blueprint.offered_load(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ProcessorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.streams.is_empty() {
        warnings.push("No streams configured".to_string());
    }

    let capacity = blueprint.processor.max_channel_size;
    for stream in &blueprint.streams {
        if stream.burst > capacity {
            warnings.push(format!(
                "Stream '{}' bursts {} values into a channel of {}; the oldest will be evicted",
                stream.key, stream.burst, capacity
            ));
        }
        if stream.consumer == ConsumerKind::Log && stream.rate_hz * stream.burst as f64 > 1000.0 {
            warnings.push(format!(
                "Stream '{}' logs more than 1000 values/s",
                stream.key
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Max channel size: {}", summary.max_channel_size);
            println!("  Streams: {}", summary.stream_count);
            println!("  Offered load: {:.1} values/s", summary.offered_load);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
