//! Observability utilities shared by services.
//!
//! This crate provides:
//! - [`Logger`]: injected structured logger producing spans with the standard
//!   fields (`queryID`, `verb`, `path`, `hostname`, `method`)
//! - [`RequestContext`]: explicit request metadata threaded through calls
//! - Axum middleware for query-id injection, panic recovery and request metrics
//! - Prometheus metrics recording and export, optionally on a dedicated
//!   listener ([`MetricsServer`])
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{Logger, init_metrics, metrics_handler};
//! use observability::middleware::{query_id_middleware, panic_recovery_layer};
//!
//! let logger = Logger::new(&log_config);
//! init_metrics()?;
//!
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler))
//!     .layer(middleware::from_fn_with_state(logger.clone(), query_id_middleware))
//!     .layer(panic_recovery_layer());
//! ```

pub mod context;
pub mod logger;
pub mod metrics_server;
pub mod middleware;

pub use context::{QueryIdGenerator, RequestContext};
pub use logger::Logger;
pub use metrics_server::{MetricsServer, MetricsServerError};
pub use middleware::{MetricsSettings, metrics_middleware, panic_recovery_layer, query_id_middleware};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Only the first successful call installs the recorder; later calls return
/// the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        "endpoint_request_count",
        "Number of HTTP requests by endpoint, method and status"
    );
    describe_histogram!(
        "endpoint_duration_milliseconds",
        "Time taken to execute an endpoint, in milliseconds"
    );
}
