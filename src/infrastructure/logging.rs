//! Logging initialization: console output plus the append-only run log
//! written into the output root. The run log records every skip, failure,
//! and repair decision; nothing machine-parses it.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::LoggingConfig;

/// Run log filename under the output root.
pub const RUN_LOG_FILE: &str = "scrape_log.txt";

// Keeps the non-blocking writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Initialize tracing with the configured level, console layer, and the run
/// log file appender under `output_dir`.
pub fn init_logging(cfg: &LoggingConfig, output_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = cfg
        .console_output
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    let file_layer = if cfg.file_output {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create log directory {}", output_dir.display()))?;
        let appender = tracing_appender::rolling::never(output_dir, RUN_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        LOG_GUARDS
            .lock()
            .expect("log guard mutex poisoned")
            .push(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;
    Ok(())
}
