//! Configuration module for the FizzBuzz service
//!
//! The service is configured from the process environment (and matching
//! command line flags, see the binary). Every value has a default, so an
//! empty environment yields a runnable configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, ServiceError};

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default ceiling on the `limit` request field
pub const DEFAULT_MAX_LIMIT: u64 = 10_000;

/// Log levels accepted by `LOG_LEVEL`
pub const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// FizzBuzz computation limits
    pub fizzbuzz: FizzBuzzConfig,

    /// Statistics reporter configuration
    pub stats: StatsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ServiceError::Config("Port cannot be 0".to_string()));
        }

        if self.server.max_body_size == 0 {
            return Err(ServiceError::Config(
                "Max body size cannot be 0".to_string(),
            ));
        }

        if self.server.header_read_timeout_secs == 0 || self.server.idle_timeout_secs == 0 {
            return Err(ServiceError::Config(
                "Connection timeouts cannot be 0".to_string(),
            ));
        }

        if self.fizzbuzz.max_limit == 0 {
            return Err(ServiceError::Config(
                "MAX_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.stats.report_timeout_secs == 0 {
            return Err(ServiceError::Config(
                "Statistics timeout cannot be 0".to_string(),
            ));
        }

        self.logging.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,

    /// How long in-flight connections may drain after a shutdown signal
    pub shutdown_timeout_secs: u64,

    /// Time allowed for a client to send a complete request head
    pub header_read_timeout_secs: u64,

    /// Keep-alive connections with no request for this long are closed
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_size: 1_048_576, // 1 MB
            shutdown_timeout_secs: 10,
            header_read_timeout_secs: 2,
            idle_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    /// Get the full server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Drain period granted to open connections on shutdown
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Deadline for reading a request head
    pub fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.header_read_timeout_secs)
    }

    /// Idle period after which a keep-alive connection is closed
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// FizzBuzz computation limits
#[derive(Debug, Clone, Serialize)]
pub struct FizzBuzzConfig {
    /// Requests with a larger `limit` are rejected
    pub max_limit: u64,
}

impl Default for FizzBuzzConfig {
    fn default() -> Self {
        Self {
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl FizzBuzzConfig {
    /// Set `max_limit` from its textual form.
    ///
    /// Anything that is not a positive integer leaves the current value in
    /// place and returns `false`.
    pub fn apply_max_limit(&mut self, raw: &str) -> bool {
        match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => {
                self.max_limit = value;
                true
            }
            _ => false,
        }
    }
}

/// Statistics reporter configuration
#[derive(Debug, Clone, Serialize)]
pub struct StatsConfig {
    /// Upper bound on a single background statistics update
    pub report_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_timeout_secs: 5,
        }
    }
}

impl StatsConfig {
    /// Timeout applied to each reporter task
    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Set the level if it is one of [`LOG_LEVELS`] (case-insensitive).
    ///
    /// Unknown levels leave the current value in place and return `false`.
    pub fn apply_level(&mut self, level: &str) -> bool {
        let level = level.trim().to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.level = level;
            true
        } else {
            false
        }
    }

    /// Validate the log level
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.level.as_str()) {
            return Err(ServiceError::Config(format!(
                "Invalid log level: {}. Expected one of: {}",
                self.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    #[default]
    Json,

    /// Human-readable format
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ServiceError::Config(format!(
                "Invalid log format: {}. Expected: json, pretty",
                other
            ))),
        }
    }
}
