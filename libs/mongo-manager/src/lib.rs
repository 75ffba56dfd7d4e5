//! Managed MongoDB connection handle that tolerates the server being down at startup.
//!
//! A [`ConnectionManager`] starts connecting as soon as it is built and keeps
//! retrying with exponential backoff (3s doubling up to 5min) until it
//! succeeds or is shut down. Callers never see a half-initialized client:
//! every accessor waits for the connection loop to reach a terminal state, or
//! for the caller's own [`Context`] to end, whichever comes first.
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB backend ([`mongodb::MongoConnector`])
//!
//! # Example
//!
//! ```ignore
//! use core_config::{FromEnv, LogConfig, MongoConfig};
//! use mongo_manager::{Context, mongodb::connect_managed};
//! use observability::Logger;
//!
//! let logger = Logger::new(&LogConfig::from_env()?);
//! let manager = connect_managed(MongoConfig::from_env()?, logger);
//!
//! // Blocks until connected, or fails after 30 seconds.
//! let ctx = Context::with_timeout(Duration::from_secs(30));
//! let user: User = manager
//!     .find_one(&ctx, "accounts", "users", Some(doc! { "email": email }))
//!     .await?;
//!
//! manager.shutdown(&Context::with_timeout(Duration::from_secs(5))).await?;
//! ```

pub mod common;
pub mod manager;
pub mod query;
pub mod session;

#[cfg(feature = "mongodb")]
pub mod mongodb;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use common::{
    Backoff, BackoffPolicy, Context, ContextError, Instant, ManagerError, ManagerResult,
    OneShotEvent, SessionError,
};
pub use manager::ConnectionManager;
pub use query::CollectionAccessor;
pub use session::{Connector, Resource, Session};
pub use tokio_util::sync::CancellationToken;
