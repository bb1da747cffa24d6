//! Logging setup for gallery commands
//!
//! Console output goes to stderr at INFO (DEBUG with `--verbose`). When the
//! project config names a `log_file`, a detailed log of every run is written
//! there as well, truncated at the start of each run.

use std::fs::File;
use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Debug log guard - keeps the file logger alive
pub struct DebugLogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize console logging, plus file logging when `log_file` is set.
///
/// The returned guard must be kept alive for the duration of the program.
///
/// # Errors
/// Returns an error if the log file cannot be created
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<Option<DebugLogGuard>> {
    let console_level = if verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)
                .wrap_err_with(|| format!("could not create log file {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);

            // File filter: capture everything at debug level for gallery crates
            let file_filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(
                        "warn,gallery=debug,gallery_core=debug,gallery_transport=debug",
                    )
                });

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(file_filter);
            (Some(layer), Some(DebugLogGuard { _guard: guard }))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}
