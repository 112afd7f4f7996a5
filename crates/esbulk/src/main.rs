//! esbulk - ship newline-delimited records from stdin to Elasticsearch
//!
//! # Usage
//!
//! ```bash
//! tail -F app.log | esbulk
//! esbulk --config esbulk.toml < events.ndjson
//! ```
//!
//! Records are buffered and written with the bulk API. Plain lines become
//! `{"@timestamp", "message", "severity", "fields"}` documents; JSON objects
//! are sent as they are.

mod record;
mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use esbulk_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};
use esbulk_elastic::ElasticClient;
use esbulk_writer::{BulkWriter, MetricsSnapshot, WriterError, WriterEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Ship newline-delimited records from stdin to Elasticsearch
#[derive(Parser, Debug)]
#[command(name = "esbulk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let level = resolve_log_level(cli.log_level, &config);
    init_logging(level, &config.log)?;

    if let Some(path) = &cli.config {
        info!(config = %path.display(), "using config file");
    } else {
        info!("no config file given, using defaults");
    }

    run(config).await
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<LogLevel>, config: &Config) -> LogLevel {
    cli_level.unwrap_or(config.log.level)
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: LogLevel, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(level.as_str())
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);

    match (&log.output, log.format) {
        (LogOutput::Stdout, LogFormat::Console) => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
            .init(),
        (LogOutput::Stdout, LogFormat::Json) => registry
            .with(fmt::layer().json().with_writer(std::io::stdout))
            .init(),
        (LogOutput::Stderr, LogFormat::Console) => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        (LogOutput::Stderr, LogFormat::Json) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (LogOutput::File(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {path}"))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            match format {
                LogFormat::Console => registry.with(layer).init(),
                LogFormat::Json => registry.with(layer.json()).init(),
            }
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let client = ElasticClient::new(settings::elastic_config(&config))
        .context("failed to create Elasticsearch client")?;
    let writer_config = settings::writer_config(&config)?;

    // Fail before reading any input if the suffix pattern is broken
    record::index_name(&config.index, Utc::now())?;

    info!(
        url = %config.elasticsearch.url,
        interval = ?writer_config.interval,
        buffering = writer_config.buffering,
        "starting bulk writer"
    );

    let (writer, task) = BulkWriter::new(client, writer_config);
    let worker = tokio::spawn(task.run());
    let supervisor = tokio::spawn(supervise(writer.clone(), writer.subscribe()));

    writer.start()?;

    tokio::select! {
        result = pump_stdin(&writer, &config) => {
            result?;
            info!("input closed, shutting down");
        }
        _ = wait_for_shutdown() => {
            info!("shutdown signal received, flushing remaining records");
        }
    }

    supervisor.abort();
    let summary = match writer.shutdown().await {
        Ok(summary) => summary,
        Err(_) => worker.await.context("writer task panicked")?,
    };
    report(&summary);

    Ok(())
}

/// Append every stdin line until EOF
async fn pump_stdin(writer: &BulkWriter, config: &Config) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let now = Utc::now();
        let index = record::index_name(&config.index, now)?;
        match writer.append(index, record::shape_record(&line, now)) {
            Ok(()) => {}
            // Already reported through the event channel
            Err(WriterError::CapacityExceeded { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Start over with the startup profile when reconnecting gives up
async fn supervise(writer: BulkWriter, mut events: broadcast::Receiver<WriterEvent>) {
    loop {
        match events.recv().await {
            Ok(WriterEvent::Error(WriterError::ReconnectExhausted { attempts, .. })) => {
                warn!(attempts, "reconnect gave up, retrying with startup backoff");
                if writer.start().is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "writer events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn report(summary: &MetricsSnapshot) {
    info!(
        appended = summary.records_appended,
        written = summary.records_written,
        rejected = summary.records_rejected,
        exhausted = summary.records_exhausted,
        trimmed = summary.records_trimmed,
        dropped = summary.records_dropped_capacity,
        failed = summary.records_failed,
        abandoned = summary.records_abandoned,
        lost = summary.records_lost(),
        bulk_requests = summary.bulk_requests,
        bulk_failures = summary.bulk_failures,
        "esbulk shutdown complete"
    );
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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
}
