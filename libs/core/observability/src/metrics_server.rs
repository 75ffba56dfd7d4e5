//! Dedicated listener serving `/metrics` for Prometheus to scrape.
//!
//! Starts at most once and stops at most once. Stopping a server that was
//! never started reports [`MetricsServerError::NotStarted`].

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Router, routing::get};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics_handler;

/// Errors of the metrics listener lifecycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsServerError {
    #[error("server not started")]
    NotStarted,

    #[error("failed to bind metrics server to {addr}: {details}")]
    Bind { addr: String, details: String },

    #[error("metrics server failed: {0}")]
    Serve(String),

    #[error("metrics server did not stop within {0:?}")]
    ShutdownTimedOut(Duration),
}

type Served = Shared<BoxFuture<'static, Result<(), MetricsServerError>>>;

#[derive(Clone)]
struct Running {
    addr: SocketAddr,
    stop: Arc<watch::Sender<bool>>,
    served: Served,
}

/// Start-once, stop-once HTTP listener exposing the Prometheus recorder.
///
/// ```rust,ignore
/// let metrics = MetricsServer::new();
/// metrics.start(("0.0.0.0", 9090))?;
/// // ...
/// metrics.shutdown(Duration::from_secs(5)).await?;
/// ```
#[derive(Default)]
pub struct MetricsServer {
    running: Mutex<Option<Running>>,
}

impl MetricsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind and start serving `/metrics`.
    ///
    /// Only the first call binds; later calls return the address already in
    /// use. Must be called from within a tokio runtime.
    pub fn start(&self, addr: impl ToSocketAddrs) -> Result<SocketAddr, MetricsServerError> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(running) = running.as_ref() {
            debug!(addr = %running.addr, "Metrics server already started");
            return Ok(running.addr);
        }

        let listener = bind(addr)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MetricsServerError::Serve(e.to_string()))?;

        let (stop, mut stopped) = watch::channel(false);
        let router = Router::new().route("/metrics", get(metrics_handler));

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stopped.wait_for(|stop| *stop).await;
                })
                .await
                .map_err(|e| {
                    warn!(error = %e, "Metrics server stopped");
                    MetricsServerError::Serve(e.to_string())
                })
        });

        let served = async move {
            task.await
                .unwrap_or_else(|e| Err(MetricsServerError::Serve(e.to_string())))
        }
        .boxed()
        .shared();

        info!(addr = %local_addr, "Metrics server listening");
        *running = Some(Running {
            addr: local_addr,
            stop: Arc::new(stop),
            served,
        });

        Ok(local_addr)
    }

    /// Address the server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|running| running.addr)
    }

    /// Stop accepting scrapes and wait up to `timeout` for open connections
    /// to finish.
    ///
    /// The server is stopped once; every call returns the outcome of that
    /// single stop.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), MetricsServerError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(MetricsServerError::NotStarted)?;

        debug!(addr = %running.addr, "Stopping metrics server");
        running.stop.send_replace(true);

        match tokio::time::timeout(timeout, running.served).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?timeout, "Metrics server did not stop in time");
                Err(MetricsServerError::ShutdownTimedOut(timeout))
            }
        }
    }
}

fn bind(addr: impl ToSocketAddrs) -> Result<tokio::net::TcpListener, MetricsServerError> {
    let addrs: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|e| MetricsServerError::Bind {
            addr: "<unresolved>".to_string(),
            details: e.to_string(),
        })?
        .collect();
    let shown = addrs
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<none>".to_string());
    let bind_error = |e: std::io::Error| MetricsServerError::Bind {
        addr: shown.clone(),
        details: e.to_string(),
    };

    let listener = std::net::TcpListener::bind(&addrs[..]).map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;
    tokio::net::TcpListener::from_std(listener).map_err(bind_error)
}
