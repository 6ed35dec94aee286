//! # Observability
//!
//! Tracing initialization, Prometheus export, and delivery statistics.
//!
//! ## Features
//!
//! - Tracing setup (JSON/Pretty/Compact), filtered by `RUST_LOG`
//! - Prometheus exporter for the `metrics` facade
//! - Per-stream delivery statistics (latency, sequence gaps)
//!
//! ## Example
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig::from_verbosity(1, false, LogFormat::Pretty))?;
//!
//! // inside a consumer
//! observability::record_delivery_latency_ms(&key, latency_ms);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_channel_depth, record_delivery_latency_ms, record_value_delivered,
    record_value_produced, DeliveryAggregator, MetricsSummary, RunningStats, StatsSummary,
    StreamSummary,
};

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Log level used when RUST_LOG is unset
    pub default_log_level: String,
    /// Ignore RUST_LOG and always use `default_log_level`
    pub force_level: bool,
}

impl ObservabilityConfig {
    /// Level from a `-v` count: 0 = info, 1 = debug, 2+ = trace.
    /// `quiet` wins and pins the level to warn.
    pub fn from_verbosity(verbose: u8, quiet: bool, log_format: LogFormat) -> Self {
        let (level, force_level) = if quiet {
            ("warn", true)
        } else {
            let level = match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            };
            (level, false)
        };

        Self {
            log_format,
            metrics_port: None,
            default_log_level: level.to_string(),
            force_level,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if self.force_level {
            return EnvFilter::new(&self.default_log_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Initialize with a custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        // Thread names matter here: consumers run on the dispatch thread.
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_thread_names(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus recorder (no tracing setup)
///
/// For binaries that configure tracing themselves.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
