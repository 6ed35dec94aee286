//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};
use config_loader::Overrides;
use contracts::{IdleStrategy, ProcessorBlueprint};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config, overrides(args))
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        max_channel_size = blueprint.processor.max_channel_size,
        idle = ?blueprint.processor.idle,
        streams = blueprint.streams.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if blueprint.streams.is_empty() {
        warn!("No streams configured - the processor will sit idle");
    }

    let mut pipeline_config = PipelineConfig::new(blueprint);
    pipeline_config.duration = (args.duration > 0).then(|| Duration::from_secs(args.duration));
    pipeline_config.metrics_port = (args.metrics_port > 0).then_some(args.metrics_port);

    info!("Starting pipeline...");

    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        enqueued = stats.processor.enqueued,
        evicted = stats.processor.evicted,
        delivered = stats.processor.delivered,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("mqp finished");
    Ok(())
}

/// Processor settings given on the command line
fn overrides(args: &RunArgs) -> Overrides {
    Overrides {
        max_channel_size: args.max_channel_size,
        idle: args.park_ms.map(|timeout_ms| IdleStrategy::Park { timeout_ms }),
        thread_name: None,
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ProcessorBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Processor:");
    println!("  Max channel size: {}", blueprint.processor.max_channel_size);
    println!("  Idle strategy: {:?}", blueprint.processor.idle);
    println!("  Dispatch thread: {}", blueprint.processor.thread_name);

    println!("\nStreams ({}):", blueprint.streams.len());
    for stream in &blueprint.streams {
        println!(
            "  - {} at {} Hz x{} -> {:?}",
            stream.key, stream.rate_hz, stream.burst, stream.consumer
        );
    }
    println!("\nOffered load: {:.1} values/s", blueprint.offered_load());
    println!();
}
