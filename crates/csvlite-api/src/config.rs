//! Engine configuration

use crate::logging::LogConfig;
use csvlite_core::query::executor::default_cpu;
use csvlite_core::{DatetimeOptions, Location, Result};
use serde::{Deserialize, Serialize};

/// Settings fixed for the lifetime of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of parallel join chunks
    pub cpu: usize,
    /// Extra datetime layouts tried before the built-in ones, e.g. `%Y/%m/%d %H:%i`
    pub datetime_formats: Vec<String>,
    /// `UTC`, `Local` or a fixed offset such as `+09:00`
    pub timezone: String,
    /// Logging applied by [`Engine::init_logging`](crate::Engine::init_logging)
    pub log: Option<LogConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            datetime_formats: Vec::new(),
            timezone: "Local".to_string(),
            log: None,
        }
    }
}

impl EngineConfig {
    /// Set the number of join chunks
    pub fn with_cpu(mut self, cpu: usize) -> Self {
        self.cpu = cpu;
        self
    }

    /// Add a datetime layout
    pub fn with_datetime_format<S: Into<String>>(mut self, format: S) -> Self {
        self.datetime_formats.push(format.into());
        self
    }

    /// Set the timezone used for datetime strings without an offset
    pub fn with_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Set the logging configuration
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    /// Datetime settings handed to the core. Fails on an unknown timezone.
    pub fn datetime_options(&self) -> Result<DatetimeOptions> {
        let location = Location::parse(&self.timezone)?;
        Ok(DatetimeOptions::new(&self.datetime_formats, location))
    }
}
