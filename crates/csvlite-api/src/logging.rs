//! Logging configuration for csvlite
//!
//! The engine emits `tracing` events at every pipeline stage, per join
//! chunk and per recursive CTE iteration. This module installs a
//! subscriber for them, writing to stdout, a daily rolling file, or both.

use csvlite_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::{
    self,
    format::{DefaultFields, Format},
    MakeWriter,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Log output destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file with daily rotation
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level, in `EnvFilter` syntax such as `debug` or `csvlite_core=trace`
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create config with info level and stdout output
    pub fn info() -> Self {
        Self::default()
    }

    /// Create config with debug level, which shows every pipeline stage
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Create config with trace level, which adds join chunk events
    pub fn trace() -> Self {
        Self {
            level: "trace".to_string(),
            ..Default::default()
        }
    }

    /// Create config with warn level
    pub fn warn() -> Self {
        Self {
            level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Set log output to file with rotation
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// The level filter. `RUST_LOG` takes precedence over the configured level.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::InvalidValue(format!("log level {}: {}", self.level, e)))
    }

    /// Installs the global subscriber.
    ///
    /// Returns the appender guard when a file is written; events logged after
    /// the guard is dropped may be lost. Fails on an invalid level or when a
    /// global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use csvlite::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().init()?;
    /// # Ok::<(), csvlite::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let filter = self.env_filter()?;
        let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
        let mut guard = None;

        if matches!(self.output, LogOutput::Stdout | LogOutput::Both(_)) {
            layers.push(self.styled(fmt::layer()));
        }
        if let LogOutput::File(path) | LogOutput::Both(path) = &self.output {
            let (writer, file_guard) = file_writer(path);
            layers.push(self.styled(fmt::layer().with_writer(writer).with_ansi(false)));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| Error::InvalidValue(format!("logging already initialized: {}", e)))?;
        Ok(guard)
    }

    fn styled<W>(&self, layer: fmt::Layer<Registry, DefaultFields, Format, W>) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        match self.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Daily rolling appender named after the file part of `path`.
fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("csvlite.log");
    tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::debug()
            .with_file("/tmp/test.log")
            .with_format(LogFormat::Compact);
        assert_eq!(config.level, "debug");
        assert!(matches!(config.output, LogOutput::File(_)));
        assert!(matches!(config.format, LogFormat::Compact));

        let config = LogConfig::warn().with_both("logs/csvlite.log").with_level("csvlite_core=trace");
        assert_eq!(config.level, "csvlite_core=trace");
        assert!(matches!(config.output, LogOutput::Both(_)));
    }

    #[test]
    fn test_log_config_serde() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "trace", "format": "Compact"}"#).unwrap();
        assert_eq!(config.level, "trace");
        assert_eq!(config.output, LogOutput::Stdout);
        assert_eq!(config.format, LogFormat::Compact);
    }
}
