//! MongoDB test infrastructure
//!
//! Provides a `TestMongo` helper that creates a MongoDB container for testing.

use core_config::MongoConfig;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mongo::Mongo;

/// Test MongoDB wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestMongo;
///
/// # async fn example() {
/// let mongo = TestMongo::new().await;
/// let config = mongo.config();
/// // Hand `config` to the code under test
/// # }
/// ```
pub struct TestMongo {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    /// `host:port` of the container, without scheme
    pub endpoint: String,
}

impl TestMongo {
    /// Create a new test MongoDB instance
    ///
    /// Uses the MongoDB 8 image, without authentication.
    pub async fn new() -> Self {
        let container = Mongo::default()
            .with_tag("8")
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let host_port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");

        let endpoint = format!("127.0.0.1:{}", host_port);

        tracing::info!(port = host_port, "Test MongoDB ready (mongo:8)");

        Self {
            container,
            endpoint,
        }
    }

    /// Configuration pointing at the container, with short retry delays
    pub fn config(&self) -> MongoConfig {
        let mut config = MongoConfig::new(self.endpoint.clone());
        config.connect_timeout_secs = 5;
        config.server_selection_timeout_secs = 5;
        config.retry_initial_secs = 1;
        config.retry_max_secs = 5;
        config
    }
}
