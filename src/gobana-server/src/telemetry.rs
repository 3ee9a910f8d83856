//! Structured logging for the `gobana` and `elastui` binaries
//!
//! - JSON formatted logs to `logfile` when one is configured
//! - Human-readable console output on stderr otherwise, so values
//!   printed on stdout stay pipeable
//! - `RUST_LOG` overrides the level derived from `loglevel`

use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map the numeric `loglevel` setting onto a tracing level
pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::OFF,
        1 | 2 => LevelFilter::ERROR,
        3 => LevelFilter::WARN,
        4 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Initialize logging
///
/// Returns a guard when logging to a file; it must be kept alive until
/// exit so buffered lines are flushed.
pub fn init_telemetry(level: u8, logfile: &str) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter(level).into())
        .from_env_lossy();

    let (file_layer, console_layer, guard) = if logfile.is_empty() {
        let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        (None, Some(console_layer), None)
    } else {
        let path = Path::new(logfile);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("log file '{}' has no file name", logfile))?;
        std::fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(name)
            .build(dir)?;
        let (non_blocking_file, guard) = tracing_appender::non_blocking(appender);

        let file_layer = fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true);
        (Some(file_layer), None, Some(guard))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(guard)
}
