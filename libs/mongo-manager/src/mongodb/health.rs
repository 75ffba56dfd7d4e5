use bson::doc;
use std::time::Instant;

use super::MongoManager;

/// Health check status for MongoDB
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the database is healthy
    pub healthy: bool,
    /// Optional message (e.g., error details)
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Check MongoDB health with a `ping` command.
///
/// Never waits for the connection: a manager that is still connecting, or
/// that gave up, reports unhealthy right away.
pub async fn check_health(manager: &MongoManager) -> bool {
    check_health_detailed(manager).await.healthy
}

/// Check MongoDB health with detailed status
///
/// Returns timing information and any error messages.
///
/// # Example
/// ```ignore
/// let status = check_health_detailed(&manager).await;
/// if status.healthy {
///     println!("MongoDB healthy, latency: {}ms", status.response_time_ms);
/// } else {
///     println!("MongoDB unhealthy: {:?}", status.message);
/// }
/// ```
pub async fn check_health_detailed(manager: &MongoManager) -> HealthStatus {
    let Some(session) = manager.session() else {
        let message = if manager.is_ready() {
            "client was not connected"
        } else {
            "connection not established yet"
        };
        return HealthStatus {
            healthy: false,
            message: Some(message.to_string()),
            response_time_ms: 0,
        };
    };

    let start = Instant::now();
    let ping = session
        .client()
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match ping {
        Ok(_) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BackoffPolicy, Context};
    use crate::mongodb::MongoConnector;
    use crate::ConnectionManager;
    use core_config::MongoConfig;
    use observability::Logger;

    #[tokio::test]
    async fn test_unhealthy_after_giving_up() {
        let manager = ConnectionManager::with_backoff(
            MongoConnector::new(MongoConfig::new("")),
            BackoffPolicy::default(),
            Logger::default(),
        );
        manager.shutdown(&Context::background()).await.unwrap();

        let status = check_health_detailed(&manager).await;
        assert!(!status.healthy);
        assert_eq!(status.message.as_deref(), Some("client was not connected"));
        assert!(!check_health(&manager).await);
    }
}
