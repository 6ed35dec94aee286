//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;
use contracts::ProcessorBlueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    processor: ProcessorInfo,
    streams: Vec<StreamInfo>,
    offered_load: f64,
}

#[derive(Serialize)]
struct ProcessorInfo {
    max_channel_size: usize,
    idle: String,
    thread_name: String,
}

#[derive(Serialize)]
struct StreamInfo {
    key: String,
    rate_hz: f64,
    burst: usize,
    consumer: String,
    subscribe_delay_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config, Default::default())
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &ProcessorBlueprint, args: &InfoArgs) -> ConfigInfo {
    let streams = blueprint
        .streams
        .iter()
        .map(|s| StreamInfo {
            key: s.key.to_string(),
            rate_hz: s.rate_hz,
            burst: s.burst,
            consumer: format!("{:?}", s.consumer),
            subscribe_delay_ms: s.subscribe_delay_ms,
            params: if args.params {
                s.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        processor: ProcessorInfo {
            max_channel_size: blueprint.processor.max_channel_size,
            idle: format!("{:?}", blueprint.processor.idle),
            thread_name: blueprint.processor.thread_name.clone(),
        },
        streams,
        offered_load: blueprint.offered_load(),
    }
}

fn print_config_info(blueprint: &ProcessorBlueprint, args: &InfoArgs) {
    println!("=== mqp Configuration ===\n");

    println!("Processor");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Max channel size: {}", blueprint.processor.max_channel_size);
    println!("   ├─ Idle strategy: {:?}", blueprint.processor.idle);
    println!("   └─ Dispatch thread: {}", blueprint.processor.thread_name);

    println!("\nStreams ({})", blueprint.streams.len());
    for (i, stream) in blueprint.streams.iter().enumerate() {
        let is_last = i == blueprint.streams.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({} Hz x{}, {:?})",
            prefix, stream.key, stream.rate_hz, stream.burst, stream.consumer
        );
        if stream.subscribe_delay_ms > 0 {
            println!(
                "   {}  subscribes after {} ms",
                child_prefix, stream.subscribe_delay_ms
            );
        }
        if args.params {
            let params: BTreeMap<_, _> = stream.params.iter().collect();
            for (key, value) in params {
                println!("   {}  {} = {}", child_prefix, key, value);
            }
        }
    }

    println!("\nOffered load: {:.1} values/s", blueprint.offered_load());
    println!();
}
