//! Connection manager: background connection loop, readiness gate and
//! exactly-once shutdown.

use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use observability::Logger;
use tracing::{Instrument, debug, error, info, warn};

use crate::common::{BackoffPolicy, Context, ManagerError, ManagerResult, OneShotEvent};
use crate::session::{Connector, Session};

/// Managed handle to one logical connection.
///
/// Construction never fails and never blocks: a background task keeps trying
/// to connect with exponential backoff until it succeeds or
/// [`shutdown`](ConnectionManager::shutdown) is called. Callers block on
/// first use until the connection loop reaches a terminal state or their own
/// [`Context`] ends.
///
/// Clones share the same connection, loop and shutdown state.
///
/// # Example
///
/// ```ignore
/// use mongo_manager::{Context, ConnectionManager};
///
/// let manager = ConnectionManager::new(connector, logger);
///
/// let ctx = Context::with_timeout(Duration::from_secs(30));
/// let orders = manager.resource(&ctx, "shop", "orders").await?;
///
/// manager.shutdown(&Context::with_timeout(Duration::from_secs(5))).await?;
/// ```
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Inner<C::Session>>,
}

struct Inner<S> {
    /// Written once by the connection loop, before `ready` fires
    session: OnceLock<S>,
    /// Fired by the connection loop as its last act, success or not
    ready: OneShotEvent,
    /// Fired by the shutdown sequence
    abort: OneShotEvent,
    /// The single shutdown sequence, shared by every caller
    closing: OnceLock<Shared<BoxFuture<'static, ManagerResult<()>>>>,
    endpoint: String,
    logger: Logger,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Start connecting with the default schedule (3s doubling up to 5min).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(connector: C, logger: Logger) -> Self {
        Self::with_backoff(connector, BackoffPolicy::default(), logger)
    }

    /// Start connecting with a custom retry schedule.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_backoff(connector: C, backoff: BackoffPolicy, logger: Logger) -> Self {
        let inner = Arc::new(Inner {
            session: OnceLock::new(),
            ready: OneShotEvent::new(),
            abort: OneShotEvent::new(),
            closing: OnceLock::new(),
            endpoint: connector.endpoint(),
            logger,
        });

        tokio::spawn(connect_loop(connector, backoff, inner.clone()));

        Self { inner }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// Whether the connection loop has reached a terminal state
    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_fired()
    }

    /// Whether a session has been established
    pub fn is_connected(&self) -> bool {
        self.inner.session.get().is_some()
    }

    /// The established session, without waiting
    pub fn session(&self) -> Option<&C::Session> {
        self.inner.session.get()
    }

    /// Wait until the connection loop reaches a terminal state or `ctx` ends.
    pub async fn wait_ready(&self, ctx: &Context) -> ManagerResult<()> {
        tokio::select! {
            biased;
            _ = self.inner.ready.wait() => Ok(()),
            err = ctx.done() => Err(ManagerError::Cancelled(err)),
        }
    }

    /// Wait for readiness, then return the session.
    ///
    /// Fails with [`ManagerError::NotConnected`] when the loop was stopped
    /// before it managed to connect.
    pub async fn connected_session(&self, ctx: &Context) -> ManagerResult<&C::Session> {
        self.wait_ready(ctx).await?;
        self.inner.session.get().ok_or(ManagerError::NotConnected)
    }

    /// Get the named collection inside the named database.
    ///
    /// Blocks until the connection loop is done or `ctx` ends, whichever
    /// comes first. Safe to call concurrently and repeatedly.
    pub async fn resource(
        &self,
        ctx: &Context,
        database: &str,
        resource: &str,
    ) -> ManagerResult<<C::Session as Session>::Resource> {
        let session = self.connected_session(ctx).await?;

        session
            .resolve(database, resource)
            .ok_or_else(|| ManagerError::ResourceUnavailable {
                database: database.to_string(),
                resource: resource.to_string(),
            })
    }

    /// Stop the connection loop and close the session.
    ///
    /// The sequence runs once, on its own task; every call, concurrent or
    /// later, returns the recorded outcome of that single run:
    /// 1. ask the connection loop to stop retrying
    /// 2. wait for the loop to finish, or for `ctx` to end
    /// 3. close the session if one was established
    ///
    /// The first caller's `ctx` bounds the sequence. Dropping a `shutdown`
    /// future only stops that caller from waiting; the sequence carries on.
    ///
    /// If `ctx` ends during step 2 the context error is recorded. A connection
    /// attempt that is still in flight is not interrupted: the loop notices
    /// the stop request once that attempt returns and then exits on its own.
    pub async fn shutdown(&self, ctx: &Context) -> ManagerResult<()> {
        let closing = self.inner.closing.get_or_init(|| {
            let task = tokio::spawn(close_once(self.inner.clone(), ctx.clone()));
            async move {
                task.await
                    .unwrap_or_else(|e| Err(ManagerError::DisconnectFailed(e.to_string())))
            }
            .boxed()
            .shared()
        });

        closing.clone().await
    }
}

async fn close_once<S: Session>(inner: Arc<Inner<S>>, ctx: Context) -> ManagerResult<()> {
    let span = inner
        .logger
        .request_span(ctx.request(), "ConnectionManager::shutdown");

    async {
        info!(endpoint = %inner.endpoint, "Shutdown requested");
        inner.abort.fire();

        tokio::select! {
            biased;
            _ = inner.ready.wait() => debug!("Connection loop is done"),
            err = ctx.done() => {
                warn!(error = %err, "Connection loop not finished before the shutdown deadline");
                return Err(ManagerError::Cancelled(err));
            }
        }

        let Some(session) = inner.session.get() else {
            debug!("Never connected, nothing to close");
            return Ok(());
        };

        debug!("Closing connection");
        let result = tokio::select! {
            biased;
            closed = session.disconnect() => {
                closed.map_err(|e| ManagerError::DisconnectFailed(e.to_string()))
            }
            err = ctx.done() => Err(ManagerError::Cancelled(err)),
        };

        match &result {
            Ok(()) => info!("Connection closed"),
            Err(e) => warn!(error = %e, "Failed to close connection"),
        }
        result
    }
    .instrument(span)
    .await
}

/// Keep connecting until success or abort, then fire `ready`.
async fn connect_loop<C: Connector>(
    connector: C,
    policy: BackoffPolicy,
    inner: Arc<Inner<C::Session>>,
) {
    let span = inner.logger.span("ConnectionManager::connect_loop");

    async {
        info!(endpoint = %inner.endpoint, "Starting connection loop");

        let mut backoff = policy.start();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            match connector.connect().await {
                Ok(session) => {
                    // Only this task writes the cell.
                    let _ = inner.session.set(session);
                    info!(attempt, "Connection established");
                    break;
                }
                Err(e) => {
                    let err = ManagerError::ConnectFailed(e.to_string());
                    let retry_in = backoff.current();
                    error!(
                        error = %err,
                        attempt,
                        retry_in = ?retry_in,
                        "Failed to connect, retrying in {:?}",
                        retry_in
                    );

                    tokio::select! {
                        biased;
                        _ = inner.abort.wait() => {
                            info!("Interrupting connection loop");
                            break;
                        }
                        _ = tokio::time::sleep(retry_in) => {}
                    }

                    backoff.advance();
                }
            }
        }

        debug!("Notifying connection loop is done");
        inner.ready.fire();
    }
    .instrument(span)
    .await
}
