use async_trait::async_trait;
use bson::Document;
use core_config::MongoConfig;
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Collection};
use observability::Logger;
use tracing::debug;

use crate::common::{BackoffPolicy, SessionError};
use crate::manager::ConnectionManager;
use crate::session::{Connector, Resource, Session};

/// Connection manager backed by a real MongoDB deployment
pub type MongoManager = ConnectionManager<MongoConnector>;

/// Opens MongoDB sessions from a [`MongoConfig`]
#[derive(Clone, Debug)]
pub struct MongoConnector {
    config: MongoConfig,
}

impl MongoConnector {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Retry schedule configured alongside the endpoint
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new()
            .with_initial(self.config.retry_initial())
            .with_max(self.config.retry_max())
    }

    fn connection_string(&self) -> Result<String, SessionError> {
        if self.config.url.is_empty() {
            return Err(SessionError::new("mongo url can't be empty"));
        }
        Ok(format!("mongodb://{}", self.config.url))
    }

    async fn client_options(&self) -> Result<ClientOptions, SessionError> {
        let mut options = ClientOptions::parse(self.connection_string()?).await?;

        options.connect_timeout = Some(self.config.connect_timeout());
        options.server_selection_timeout = Some(self.config.server_selection_timeout());

        if let Some(ref app_name) = self.config.app_name {
            options.app_name = Some(app_name.clone());
        }

        if let Some(ref user) = self.config.user {
            let mut credential = Credential::default();
            credential.username = Some(user.clone());
            credential.password = self.config.password.clone();
            credential.source = Some(self.config.auth_source.clone());
            options.credential = Some(credential);
        }

        Ok(options)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Session = MongoSession;

    fn endpoint(&self) -> String {
        self.config.url.clone()
    }

    async fn connect(&self) -> Result<MongoSession, SessionError> {
        debug!(endpoint = %self.config.url, "Attempting to connect to MongoDB");

        let client = Client::with_options(self.client_options().await?)?;

        // Creating a client does not talk to the server; this does.
        client.list_database_names().await?;

        Ok(MongoSession { client })
    }
}

/// Start a managed connection using the endpoint, credentials and retry
/// schedule from `config`.
///
/// # Example
/// ```ignore
/// use core_config::{FromEnv, MongoConfig};
/// use mongo_manager::mongodb::connect_managed;
///
/// let manager = connect_managed(MongoConfig::from_env()?, logger);
/// ```
pub fn connect_managed(config: MongoConfig, logger: Logger) -> MongoManager {
    let connector = MongoConnector::new(config);
    let backoff = connector.backoff_policy();
    ConnectionManager::with_backoff(connector, backoff, logger)
}

/// An established MongoDB client
#[derive(Clone, Debug)]
pub struct MongoSession {
    client: Client,
}

impl MongoSession {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Session for MongoSession {
    type Resource = MongoResource;

    fn resolve(&self, database: &str, resource: &str) -> Option<MongoResource> {
        if !is_valid_database_name(database) || !is_valid_collection_name(resource) {
            return None;
        }

        let collection = self.client.database(database).collection::<Document>(resource);
        Some(MongoResource { collection })
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// A MongoDB collection of raw documents
#[derive(Clone, Debug)]
pub struct MongoResource {
    collection: Collection<Document>,
}

impl MongoResource {
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }
}

#[async_trait]
impl Resource for MongoResource {
    async fn find_one(&self, filter: Document) -> Result<Option<Document>, SessionError> {
        Ok(self.collection.find_one(filter).await?)
    }
}

const MAX_DATABASE_NAME_LEN: usize = 64;

fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < MAX_DATABASE_NAME_LEN
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$' | '\0'))
}

fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['$', '\0']) && !name.starts_with("system.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_database_names() {
        assert!(is_valid_database_name("shop"));
        assert!(is_valid_database_name("shop_2024"));
        assert!(!is_valid_database_name(""));
        assert!(!is_valid_database_name("shop.orders"));
        assert!(!is_valid_database_name("my shop"));
        assert!(!is_valid_database_name("a/b"));
        assert!(!is_valid_database_name(&"x".repeat(64)));
    }

    #[test]
    fn test_collection_names() {
        assert!(is_valid_collection_name("orders"));
        assert!(is_valid_collection_name("orders.archive"));
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("$cmd"));
        assert!(!is_valid_collection_name("system.users"));
    }

    #[test]
    fn test_connection_string() {
        let connector = MongoConnector::new(MongoConfig::new("db:27017"));
        assert_eq!(connector.connection_string().unwrap(), "mongodb://db:27017");

        let empty = MongoConnector::new(MongoConfig::new(""));
        assert!(empty.connection_string().is_err());
    }

    #[test]
    fn test_backoff_policy_from_config() {
        let mut config = MongoConfig::new("db:27017");
        config.retry_initial_secs = 1;
        config.retry_max_secs = 8;

        let delays: Vec<_> = MongoConnector::new(config).backoff_policy().start().take(5).collect();
        assert_eq!(
            delays,
            [1, 2, 4, 8, 8].map(Duration::from_secs).to_vec()
        );
    }

    #[tokio::test]
    async fn test_client_options_apply_credentials() {
        let config = MongoConfig::new("db:27017")
            .with_credentials("reader", "s3cret", "users")
            .with_app_name("catalog");

        let options = MongoConnector::new(config).client_options().await.unwrap();

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("reader"));
        assert_eq!(credential.password.as_deref(), Some("s3cret"));
        assert_eq!(credential.source.as_deref(), Some("users"));
        assert_eq!(options.app_name.as_deref(), Some("catalog"));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_client_options_without_user_have_no_credential() {
        let options = MongoConnector::new(MongoConfig::new("db:27017"))
            .client_options()
            .await
            .unwrap();
        assert!(options.credential.is_none());
    }

    #[tokio::test]
    async fn test_empty_url_fails_to_connect() {
        let err = MongoConnector::new(MongoConfig::new("")).connect().await.unwrap_err();
        assert!(err.message().contains("empty"));
    }
}
