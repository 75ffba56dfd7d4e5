/// Why a caller's [`Context`](super::Context) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Error reported by a backend across the session seam
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SessionError {
    message: String,
}

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for SessionError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors surfaced by the connection manager and its query helper
///
/// `Clone` so the outcome of the single shutdown sequence can be handed to
/// every caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    /// A connection attempt failed; only ever logged by the connection loop
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The connection loop stopped before a session was established
    #[error("client was not connected")]
    NotConnected,

    /// The caller's context ended first
    #[error(transparent)]
    Cancelled(#[from] ContextError),

    /// The database or collection name resolved to nothing
    #[error("collection {database}.{resource} is unavailable")]
    ResourceUnavailable { database: String, resource: String },

    /// Failure to obtain a collection, annotated with its names
    #[error("failed to get db {database} collection {resource}: {source}")]
    Collection {
        database: String,
        resource: String,
        #[source]
        source: Box<ManagerError>,
    },

    /// The lookup matched no document
    #[error("no document matches the filter")]
    NotFound,

    /// The lookup itself failed on the server side
    #[error("Query failed: {0}")]
    Query(String),

    /// The matched document does not fit the requested type
    #[error("failed to decode document: {0}")]
    DecodeFailed(String),

    /// Closing the session failed
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),
}

impl ManagerError {
    /// The innermost error, looking through [`ManagerError::Collection`]
    pub fn root_cause(&self) -> &ManagerError {
        match self {
            ManagerError::Collection { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_error_names_db_and_collection() {
        let err = ManagerError::Collection {
            database: "shop".to_string(),
            resource: "orders".to_string(),
            source: Box::new(ManagerError::NotConnected),
        };

        let rendered = err.to_string();
        assert!(rendered.contains("shop"));
        assert!(rendered.contains("orders"));
        assert!(rendered.contains("not connected"));
        assert_eq!(err.root_cause(), &ManagerError::NotConnected);
    }

    #[test]
    fn test_cancelled_displays_context_error() {
        let err = ManagerError::from(ContextError::DeadlineExceeded);
        assert_eq!(err.to_string(), "context deadline exceeded");
    }
}
