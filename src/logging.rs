use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log files are `<dir>/fdp.log.<YYYY-MM-DD>`, a new one every day.
pub(crate) const LOG_FILE_PREFIX: &str = "fdp.log";

/// Sends every event both to stderr and to the rotating log file in `log_dir`.
/// Verbosity comes from `RUST_LOG`, `info` when unset.
///
/// The returned guard flushes the file writer when dropped; keep it alive for the
/// whole run.
pub(crate) fn init(log_dir: &Path) -> Result<WorkerGuard, anyhow::Error> {
    std::fs::create_dir_all(log_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;
    Ok(guard)
}
