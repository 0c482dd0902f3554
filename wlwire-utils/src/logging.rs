//! Logging infrastructure for wlwire
//!
//! The library crates only emit `tracing` events. Binaries pick a
//! [`LogConfig`] and call [`init_logging_with_config`] once at startup.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{paths, Result, WlwireError};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "WLWIRE_LOG";

/// File name used under the log directory
pub const LOG_FILE_NAME: &str = "wlwire.log";

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// `wlwire.log` under the state directory
    File,
    /// Stderr plus the log file
    Both,
}

impl LogOutput {
    fn to_stderr(self) -> bool {
        matches!(self, Self::Stderr | Self::Both)
    }

    fn to_file(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output: LogOutput,
    /// `EnvFilter` directives, e.g. "warn" or "wlwire_client=trace"
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
        }
    }
}

impl LogConfig {
    /// Command-line clients: stderr, `WLWIRE_LOG` or "warn"
    pub fn client() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
        }
    }

    /// Override the filter, e.g. from a command-line flag
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }
}

/// Install the global subscriber described by `config`
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| WlwireError::config(format!("Invalid log filter: {}", e)))?;

    let stderr_layer = config
        .output
        .to_stderr()
        .then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));

    let file_layer = if config.output.to_file() {
        let file = open_log_file()?;
        Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| WlwireError::internal(format!("Failed to init logging: {}", e)))
}

/// Path of the log file written by [`LogOutput::File`] and [`LogOutput::Both`]
pub fn log_file_path() -> PathBuf {
    paths::log_dir().join(LOG_FILE_NAME)
}

fn open_log_file() -> Result<File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join(LOG_FILE_NAME);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| {
            WlwireError::config(format!("Cannot open log file {}: {}", log_path.display(), e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_client() {
        let config = LogConfig::client();
        assert_eq!(config.output, LogOutput::Stderr);
    }

    #[test]
    fn test_builder_overrides() {
        let config = LogConfig::client()
            .with_filter("wlwire_client=trace")
            .with_output(LogOutput::Both);
        assert_eq!(config.filter, "wlwire_client=trace");
        assert_eq!(config.output, LogOutput::Both);
    }

    #[test]
    fn test_output_destinations() {
        assert!(LogOutput::Stderr.to_stderr() && !LogOutput::Stderr.to_file());
        assert!(!LogOutput::File.to_stderr() && LogOutput::File.to_file());
        assert!(LogOutput::Both.to_stderr() && LogOutput::Both.to_file());
    }

    #[test]
    fn test_log_file_under_log_dir() {
        let path = log_file_path();
        assert!(path.starts_with(paths::log_dir()));
        assert!(path.ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig::default().with_filter("wlwire=notalevel");
        assert!(matches!(
            init_logging_with_config(config),
            Err(WlwireError::Config(_))
        ));
    }
}
