use crate::{env_or_default, env_parse_or, ConfigError, FromEnv};
use std::net::Ipv4Addr;
use std::time::Duration;

/// HTTP server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Budget for each request, including the wait for the database connection
    pub request_timeout_secs: u64,
    /// Budget for closing the database connection on shutdown
    pub shutdown_timeout_secs: u64,
    /// Port of a dedicated Prometheus listener, if any
    pub metrics_port: Option<u16>,
    /// Prefix of the endpoint metric names
    pub metrics_namespace: Option<String>,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl FromEnv for ServerConfig {
    /// Reads from environment variables with sensible defaults:
    /// - HOST: defaults to 0.0.0.0 (all interfaces)
    /// - PORT: defaults to 8080
    /// - REQUEST_TIMEOUT_SECS: defaults to 30
    /// - SHUTDOWN_TIMEOUT_SECS: defaults to 10
    /// - METRICS_PORT: unset or empty means no dedicated metrics listener
    /// - METRICS_NAMESPACE: optional metric name prefix
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let metrics_port = match env_or_default("METRICS_PORT", "").trim() {
            "" => None,
            port => Some(port.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::ParseError {
                    key: "METRICS_PORT".to_string(),
                    details: e.to_string(),
                }
            })?),
        };

        Ok(Self {
            host: env_or_default("HOST", &defaults.host),
            port: env_parse_or("PORT", defaults.port)?,
            request_timeout_secs: env_parse_or(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            shutdown_timeout_secs: env_parse_or(
                "SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout_secs,
            )?,
            metrics_port,
            metrics_namespace: Some(env_or_default("METRICS_NAMESPACE", ""))
                .filter(|namespace| !namespace.is_empty()),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8080,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            metrics_port: None,
            metrics_namespace: None,
        }
    }
}
