//! Logging utilities

use crate::{ArbitrageError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize logging system
///
/// Human-readable lines go to the console, JSON lines to a daily rolling
/// file. The returned guard flushes the file writer on drop and must be held
/// for the life of the process.
pub fn init<P: AsRef<Path>>(log_level: &str, log_file: P) -> Result<WorkerGuard> {
    let log_file = log_file.as_ref();
    let directory = log_file.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(directory)?;

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        directory,
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("parity-arb.log")),
    );
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_writer);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ArbitrageError::Config(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}

/// Log a trade lifecycle event with structured fields
#[macro_export]
macro_rules! log_trade {
    ($level:ident, $trade_id:expr, $action:expr, $gap:expr, $($field:tt)+) => {
        tracing::$level!(
            trade_id = %$trade_id,
            action = %$action,
            parity_gap = %$gap,
            $($field)+
        );
    };
}

/// Log a parity observation with structured fields
#[macro_export]
macro_rules! log_parity {
    ($level:ident, $strike:expr, $gap:expr, $threshold:expr, $($field:tt)+) => {
        tracing::$level!(
            strike = %$strike,
            parity_gap = %$gap,
            threshold = %$threshold,
            $($field)+
        );
    };
}

/// Log risk information with structured fields
#[macro_export]
macro_rules! log_risk {
    ($level:ident, $rule:expr, $value:expr, $threshold:expr, $($field:tt)+) => {
        tracing::$level!(
            rule = %$rule,
            value = %$value,
            threshold = %$threshold,
            $($field)+
        );
    };
}

/// Log feed health with structured fields
#[macro_export]
macro_rules! log_health {
    ($level:ident, $feed:expr, $failures:expr, $($field:tt)+) => {
        tracing::$level!(
            feed = %$feed,
            consecutive_failures = %$failures,
            $($field)+
        );
    };
}
