//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr; file output rolls daily into
//! `vault.log.<date>` and can be switched to JSON lines.

use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::VaultResult;

const LOG_FILE_PREFIX: &str = "vault.log";

/// Initialize the global tracing subscriber.
///
/// `level` in the config accepts any `EnvFilter` directive
/// (e.g. `"info"` or `"vault_services=debug,info"`); an unparsable
/// directive falls back to `info`.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> VaultResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file_layer = if config.json_output {
        fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::error::VaultError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!("logging initialized at level={}, dir={}", config.level, log_dir.display());

    Ok(LogGuard { _guard: guard })
}

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize a console-only logger for tests and one-shot commands.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
        .try_init();
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_does_not_panic() {
        init_console_logging("debug");
        init_console_logging("debug");
    }
}
