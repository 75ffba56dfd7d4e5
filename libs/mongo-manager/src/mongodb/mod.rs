//! MongoDB backend for the connection manager
//!
//! Provides the connector, session and collection types plus health checks.

mod connector;
mod health;

pub use connector::{
    MongoConnector, MongoManager, MongoResource, MongoSession, connect_managed,
};
pub use health::{HealthStatus, check_health, check_health_detailed};

// Re-export MongoDB types for convenience
pub use ::mongodb::{Client, Collection, Database};
