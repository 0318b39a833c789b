use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config;

const MAX_LOG_SIZE: u64 = 1024 * 1024; // 1MB

/// Initialize logging for a component.
///
/// - `component_name`: Name of the log file, without extension
/// - `file_logging`: If true, also log to a file in the data directory
///
/// `RUST_LOG` overrides the default `info` filter, e.g.
/// `RUST_LOG=scripting=debug,natives=trace`.
///
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_logging(component_name: &str, file_logging: bool) -> io::Result<Option<WorkerGuard>> {
    if !file_logging {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .init();
        return Ok(None);
    }

    let log_dir = log_directory();
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(format!("{}.log", component_name));
    truncate_if_needed(&log_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let (non_blocking_file, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("Logging to file: {}", log_path.display());

    Ok(Some(guard))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn log_directory() -> PathBuf {
    config::data_dir().join("logs")
}

/// Start the log over once it grows past MAX_LOG_SIZE
fn truncate_if_needed(log_path: &Path) -> io::Result<()> {
    if log_path.exists() && fs::metadata(log_path)?.len() > MAX_LOG_SIZE {
        File::create(log_path)?;
    }
    Ok(())
}
