use crate::{env_or_default, env_parse_or, env_required, ConfigError, FromEnv};
use std::fmt;
use std::time::Duration;

/// MongoDB endpoint, credentials and reconnection settings
///
/// `url` is the `host[:port]` part of the connection string, without the
/// `mongodb://` scheme.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database holding the user's credentials
    pub auth_source: String,
    /// Optional application name for server logs
    pub app_name: Option<String>,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
    /// First delay between two failed connection attempts
    pub retry_initial_secs: u64,
    /// Upper bound of the delay between two failed connection attempts
    pub retry_max_secs: u64,
}

impl MongoConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
        auth_source: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self.auth_source = auth_source.into();
        self
    }

    /// Set the application name for server logs
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_secs(self.retry_initial_secs)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_secs(self.retry_max_secs)
    }

    /// Reject retry settings that would make reconnection spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_initial_secs == 0 {
            return Err(ConfigError::ParseError {
                key: "MONGO_RETRY_INITIAL_SECS".to_string(),
                details: "must be at least 1 second".to_string(),
            });
        }
        if self.retry_max_secs < self.retry_initial_secs {
            return Err(ConfigError::ParseError {
                key: "MONGO_RETRY_MAX_SECS".to_string(),
                details: format!(
                    "must not be below MONGO_RETRY_INITIAL_SECS ({})",
                    self.retry_initial_secs
                ),
            });
        }
        Ok(())
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "localhost:27017".to_string(),
            user: None,
            password: None,
            auth_source: "admin".to_string(),
            app_name: None,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            retry_initial_secs: 3,
            retry_max_secs: 300,
        }
    }
}

// Keeps the password out of log lines.
impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_source", &self.auth_source)
            .field("app_name", &self.app_name)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field(
                "server_selection_timeout_secs",
                &self.server_selection_timeout_secs,
            )
            .field("retry_initial_secs", &self.retry_initial_secs)
            .field("retry_max_secs", &self.retry_max_secs)
            .finish()
    }
}

/// Load MongoConfig from environment variables
///
/// - `MONGO_URL` (required) - host[:port], no scheme
/// - `MONGO_USER`, `MONGO_PASSWORD` (optional)
/// - `MONGO_AUTH_SOURCE` (optional, default: admin)
/// - `MONGO_APP_NAME` (optional)
/// - `MONGO_CONNECT_TIMEOUT_SECS` (optional, default: 10)
/// - `MONGO_SERVER_SELECTION_TIMEOUT_SECS` (optional, default: 30)
/// - `MONGO_RETRY_INITIAL_SECS` (optional, default: 3)
/// - `MONGO_RETRY_MAX_SECS` (optional, default: 300)
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let config = Self {
            url: env_required("MONGO_URL")?,
            user: non_empty("MONGO_USER"),
            password: non_empty("MONGO_PASSWORD"),
            auth_source: env_or_default("MONGO_AUTH_SOURCE", &defaults.auth_source),
            app_name: non_empty("MONGO_APP_NAME"),
            connect_timeout_secs: env_parse_or(
                "MONGO_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,
            server_selection_timeout_secs: env_parse_or(
                "MONGO_SERVER_SELECTION_TIMEOUT_SECS",
                defaults.server_selection_timeout_secs,
            )?,
            retry_initial_secs: env_parse_or(
                "MONGO_RETRY_INITIAL_SECS",
                defaults.retry_initial_secs,
            )?,
            retry_max_secs: env_parse_or("MONGO_RETRY_MAX_SECS", defaults.retry_max_secs)?,
        };

        config.validate()?;
        Ok(config)
    }
}
