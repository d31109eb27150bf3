//! Tracing setup.
//!
//! Diagnostics go to stderr, filtered by `RUST_LOG` (default `info`, or
//! `debug` with `--verbose`). The long-running loop additionally writes a
//! daily-rolling file under the configured log directory. User-facing command
//! output goes to stdout and is unaffected by either.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "autopilot.log";

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global subscriber.
///
/// With `log_dir`, a second non-blocking layer writes to
/// `<log_dir>/autopilot.log.<date>`; keep the returned guard alive until the
/// command ends or buffered lines are lost. Calling this twice is a no-op.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(default_filter(verbose));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(default_filter(verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
