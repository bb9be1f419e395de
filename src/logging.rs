//! # Structured Logging
//!
//! Environment-aware structured logging to console plus a JSON log file,
//! useful when tracing a campaign's check-in/escalation history across
//! concurrent evaluation passes.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
/// Safe to call more than once; only the first call takes effect.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            if let Err(e) = fs::create_dir_all(&log_dir) {
                eprintln!("Failed to create log directory: {e}");
                return;
            }
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        // Another subscriber may already be installed (e.g. in tests)
        if subscriber.try_init().is_ok() {
            tracing::info!(
                pid = pid,
                environment = %environment,
                log_file = %log_dir.join(&log_filename).display(),
                "Structured logging initialized"
            );
        }

        // The appender guard must live for the life of the process
        std::mem::forget(guard);
    });
}

fn get_environment() -> String {
    std::env::var("OUTREACH_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }
    match environment {
        "production" => "info".to_string(),
        "test" => "warn".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_defaults() {
        // RUST_LOG may be set in the environment; only assert the fallback
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(get_log_level("production"), "info");
            assert_eq!(get_log_level("test"), "warn");
            assert_eq!(get_log_level("development"), "debug");
        }
    }
}
