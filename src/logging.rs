use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "drill.log";

/// Used when the configured directive does not parse. sqlx logs every
/// statement at info, which drowns out the drill events.
pub const DEFAULT_LOG_DIRECTIVE: &str = "info,sqlx=warn";

/// Keeps the non-blocking file writer flushing until dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}

/// Installs the global subscriber with a stdout layer, plus a daily rolling
/// file in `file_dir` when one is given. Hold the returned guard for the
/// process lifetime.
pub fn init_tracing(directive: &str, file_dir: Option<&Path>) -> Option<FileLogGuard> {
    let stdout_layer = fmt::layer().with_target(true);

    let file_layer = file_dir.and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            Some((layer, guard))
        }
        Err(err) => {
            eprintln!("failed to create log directory {}: {err}", dir.display());
            None
        }
    });

    let (file_layer, guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(FileLogGuard { _guard: guard })),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(directive))
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = file_dir.filter(|_| guard.is_some()) {
        tracing::debug!(dir = %dir.display(), "file logging enabled");
    }
    guard
}
