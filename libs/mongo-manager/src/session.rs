//! Seam between the connection manager and the remote service.
//!
//! The manager only knows how to open a session, resolve a collection inside
//! it and close it. The MongoDB implementation lives in [`crate::mongodb`].

use async_trait::async_trait;
use bson::Document;

use crate::common::SessionError;

/// Opens sessions against one endpoint with one set of credentials
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    /// Endpoint description for log lines (never includes credentials)
    fn endpoint(&self) -> String;

    /// Make a single connection attempt
    async fn connect(&self) -> Result<Self::Session, SessionError>;
}

/// An established session
#[async_trait]
pub trait Session: Send + Sync + 'static {
    type Resource: Resource;

    /// Resolve a collection inside a database; `None` when either name
    /// resolves to nothing.
    fn resolve(&self, database: &str, resource: &str) -> Option<Self::Resource>;

    async fn disconnect(&self) -> Result<(), SessionError>;
}

/// A named collection inside the remote service
#[async_trait]
pub trait Resource: Send + Sync {
    /// First document matching `filter`, if any
    async fn find_one(&self, filter: Document) -> Result<Option<Document>, SessionError>;
}
