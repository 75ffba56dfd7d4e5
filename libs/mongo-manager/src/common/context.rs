use super::error::ContextError;
use futures::future::select_all;
use observability::RequestContext;
use std::future::pending;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use tokio::time::Instant;

/// Per-call deadline, cancellation and request metadata.
///
/// Every blocking operation of the manager takes a `Context`. Ending one
/// caller's context only releases that caller.
///
/// ```ignore
/// let ctx = Context::with_timeout(Duration::from_secs(5))
///     .with_request(logger.request_context("query", "GET", "/items"));
/// let orders = manager.resource(&ctx, "shop", "orders").await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Vec<CancellationToken>,
    request: RequestContext,
}

impl Context {
    /// A context that never ends
    pub fn background() -> Self {
        Self::default()
    }

    /// A context ending after `timeout`. A timeout too large to represent
    /// means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::background().cancelled_by(token)
    }

    /// Also end this context when `token` is cancelled. Tokens added
    /// earlier keep ending it too.
    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.cancel.push(token);
        self
    }

    /// Attach request metadata for log lines
    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = request;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Why the context ended, if it already has
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.iter().any(|t| t.is_cancelled()) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context ends. Never resolves for a background context.
    pub async fn done(&self) -> ContextError {
        let cancelled = async {
            if self.cancel.is_empty() {
                pending::<()>().await;
            }
            select_all(self.cancel.iter().map(|t| Box::pin(t.cancelled()))).await;
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => ContextError::Cancelled,
            _ = expired => ContextError::DeadlineExceeded,
        }
    }
}
