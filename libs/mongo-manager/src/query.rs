//! Single-document lookups on top of the connection manager.

use bson::Document;
use serde::de::DeserializeOwned;

use crate::common::{Context, ManagerError, ManagerResult};
use crate::manager::ConnectionManager;
use crate::session::{Connector, Resource, Session};

impl<C: Connector> ConnectionManager<C> {
    /// Find one document in `database.resource` and decode it into `T`.
    ///
    /// A missing filter matches any document. Single attempt, no retry:
    /// - failures to obtain the collection come back as
    ///   [`ManagerError::Collection`] naming the database and collection
    /// - no match is [`ManagerError::NotFound`]
    /// - a document that does not fit `T` is [`ManagerError::DecodeFailed`]
    pub async fn find_one<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        database: &str,
        resource: &str,
        filter: Option<Document>,
    ) -> ManagerResult<T> {
        let collection = self
            .resource(ctx, database, resource)
            .await
            .map_err(|e| ManagerError::Collection {
                database: database.to_string(),
                resource: resource.to_string(),
                source: Box::new(e),
            })?;

        find_in(ctx, &collection, filter.unwrap_or_default()).await
    }

    /// Facade bound to one database and collection
    pub fn accessor(
        &self,
        database: impl Into<String>,
        resource: impl Into<String>,
    ) -> CollectionAccessor<C> {
        CollectionAccessor {
            manager: self.clone(),
            database: database.into(),
            resource: resource.into(),
        }
    }
}

async fn find_in<R: Resource, T: DeserializeOwned>(
    ctx: &Context,
    collection: &R,
    filter: Document,
) -> ManagerResult<T> {
    let found = tokio::select! {
        biased;
        found = collection.find_one(filter) => found.map_err(|e| ManagerError::Query(e.to_string()))?,
        err = ctx.done() => return Err(ManagerError::Cancelled(err)),
    };

    let document = found.ok_or(ManagerError::NotFound)?;
    bson::from_document(document).map_err(|e| ManagerError::DecodeFailed(e.to_string()))
}

/// A collection handle that waits for the connection on every use.
///
/// Cheap to clone and to keep around before the connection exists.
pub struct CollectionAccessor<C: Connector> {
    manager: ConnectionManager<C>,
    database: String,
    resource: String,
}

impl<C: Connector> Clone for CollectionAccessor<C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            database: self.database.clone(),
            resource: self.resource.clone(),
        }
    }
}

impl<C: Connector> CollectionAccessor<C> {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Wait for the connection and resolve the collection.
    pub async fn get(&self, ctx: &Context) -> ManagerResult<<C::Session as Session>::Resource> {
        self.manager
            .resource(ctx, &self.database, &self.resource)
            .await
    }

    pub async fn find_one<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        filter: Option<Document>,
    ) -> ManagerResult<T> {
        self.manager
            .find_one(ctx, &self.database, &self.resource, filter)
            .await
    }
}
