//! Logging system initialization
//!
//! Installs the global tracing subscriber from `[logging]`: stdout, an
//! append-only file, or a daily-rotated file, in text or JSON format.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use crate::config::{AppConfig, LoggingConfig};
use crate::errors::{Result, ShortenerError};

const DEFAULT_LOG_FILE_NAME: &str = "url-shortener.log";

fn make_writer(logging: &LoggingConfig) -> Result<Box<dyn Write + Send + Sync>> {
    let Some(log_file) = logging.file.as_deref().filter(|f| !f.is_empty()) else {
        return Ok(Box::new(std::io::stdout()));
    };

    if logging.enable_rotation {
        let path = Path::new(log_file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let filename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(DEFAULT_LOG_FILE_NAME);
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(filename.trim_end_matches(".log"))
            .filename_suffix("log")
            .max_log_files(logging.max_backups.max(1) as usize)
            .build(dir)
            .map_err(|e| {
                ShortenerError::file_operation(format!(
                    "could not create rolling log appender in {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        return Ok(Box::new(appender));
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| {
            ShortenerError::file_operation(format!("could not open log file {}: {}", log_file, e))
        })?;
    Ok(Box::new(file))
}

/// Initialize logging; call once, after configuration is loaded.
///
/// The returned guard must stay alive for the whole process so buffered
/// lines are flushed on exit.
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let writer = make_writer(&config.logging)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(writer);

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level).map_err(|e| {
        ShortenerError::config(format!(
            "invalid logging.level '{}': {}",
            config.logging.level, e
        ))
    })?;

    let to_console = config.logging.file.as_ref().is_none_or(|f| f.is_empty());
    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_env_filter(filter)
        .with_level(true)
        .with_ansi(to_console);

    let installed = if config.logging.format == "json" {
        subscriber_builder.json().try_init()
    } else {
        subscriber_builder.try_init()
    };
    installed.map_err(|e| ShortenerError::config(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}
