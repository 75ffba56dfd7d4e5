use crate::{env_or_default, ConfigError, Environment, FromEnv};
use std::fmt;

/// Output format of the log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Parse a format name; anything unexpected falls back to text.
    pub fn parse_lossy(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Minimum severity of the emitted log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name; anything unexpected falls back to warn.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Logging configuration handed to `init_tracing` and to the `Logger`.
///
/// There is no process-wide formatter or level: whoever builds the logger
/// passes this value explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Attached to every log line as `hostname` when present
    pub hostname: Option<String>,
}

impl LogConfig {
    pub fn new(format: LogFormat, level: LogLevel) -> Self {
        Self {
            format,
            level,
            hostname: None,
        }
    }

    /// JSON/info in production, text/debug everywhere else.
    pub fn for_environment(environment: &Environment) -> Self {
        if environment.is_production() {
            Self::new(LogFormat::Json, LogLevel::Info)
        } else {
            Self::new(LogFormat::Text, LogLevel::Debug)
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        self.hostname = (!hostname.is_empty()).then_some(hostname);
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogFormat::Text, LogLevel::Info)
    }
}

impl FromEnv for LogConfig {
    /// Reads:
    /// - LOG_FORMAT: `json` or `text` (default: text)
    /// - LOG_LEVEL: trace, debug, info, warn, error (default: info, unknown values: warn)
    /// - HOSTNAME: optional, reported on every line
    fn from_env() -> Result<Self, ConfigError> {
        let format = LogFormat::parse_lossy(&env_or_default("LOG_FORMAT", "text"));
        let level = LogLevel::parse_lossy(&env_or_default("LOG_LEVEL", "info"));

        Ok(Self::new(format, level).with_hostname(env_or_default("HOSTNAME", "")))
    }
}
