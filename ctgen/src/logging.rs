//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::{CtgenError, CtgenResult};

/// Filter from `RUST_LOG`, falling back to `default_filter`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// With `log_file` set, records go through a non-blocking file writer and
/// the returned guard must be held until exit. Otherwise they go to stderr.
/// A subscriber installed earlier is left in place.
pub fn init_tracing(
    log_file: Option<&Path>,
    default_filter: &str,
) -> CtgenResult<Option<WorkerGuard>> {
    let filter = env_filter(default_filter);

    let Some(log_file) = log_file else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init();
        return Ok(None);
    };

    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_file.file_name().ok_or_else(|| {
        CtgenError::Config(format!("log file path has no file name: {}", log_file.display()))
    })?;

    std::fs::create_dir_all(dir).map_err(|e| {
        CtgenError::Storage(format!(
            "Failed to create log directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    register_to_tracing(non_blocking, filter);

    Ok(Some(guard))
}

fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .try_init();
}
