//! Axum middleware: request-scoped log metadata, panic recovery and request metrics.

use crate::context::RequestContext;
use crate::logger::Logger;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, Response, StatusCode, header},
    middleware::Next,
};
use metrics::{counter, histogram};
use std::any::Any;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::Instrument;

/// Prefix of the query ids generated for HTTP requests
pub const QUERY_ID_PREFIX: &str = "query";

/// Requests to this path are not recorded in the endpoint metrics.
pub const HEALTHCHECK_PATH: &str = "/healthcheck";

/// Middleware inserting a [`RequestContext`] into the request extensions and
/// running the rest of the stack inside the matching log span.
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Extension, Router, middleware};
/// use observability::{Logger, RequestContext, middleware::query_id_middleware};
///
/// async fn handler(Extension(ctx): Extension<RequestContext>) -> String {
///     ctx.query_id.unwrap_or_default()
/// }
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(logger, query_id_middleware));
/// ```
pub async fn query_id_middleware(
    State(logger): State<Logger>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let verb = request.method().to_string();
    let path = request.uri().path().to_string();

    let ctx = logger.request_context(QUERY_ID_PREFIX, &verb, &path);
    let span = logger.request_span(&ctx, "http_request");
    request.extensions_mut().insert(ctx);

    next.run(request).instrument(span).await
}

/// Panic handler signature used by [`panic_recovery_layer`]
pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response<Body>;

/// Layer converting a panicking handler into an HTTP 500 response.
pub fn panic_recovery_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %details, "Recovering from panic");

    let body = serde_json::json!({
        "error": "internal server error",
    })
    .to_string();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Naming shared by every endpoint metric.
#[derive(Clone, Debug)]
pub struct MetricsSettings {
    /// Value of the `app` label
    pub app: String,
    /// Prefix of the metric names, joined with `_`
    pub namespace: Option<String>,
}

impl MetricsSettings {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Full metric name, e.g. `shop_endpoint_request_count`
    pub fn metric_name(&self, name: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}_{}", namespace, name),
            None => name.to_string(),
        }
    }
}

/// Middleware function for recording HTTP request metrics.
///
/// Records:
/// - `endpoint_request_count` - Counter with app, name, method, status labels
/// - `endpoint_duration_milliseconds` - Histogram with the same labels
///
/// Both names carry the settings' namespace prefix when one is set.
/// Healthcheck requests are not recorded.
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use observability::middleware::{MetricsSettings, metrics_middleware};
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(MetricsSettings::new("catalog"), metrics_middleware));
/// ```
pub async fn metrics_middleware(
    State(settings): State<MetricsSettings>,
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().to_string();
    let uri_path = request.uri().path().to_string();
    let name = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| uri_path.clone());

    let response = next.run(request).await;

    if uri_path == HEALTHCHECK_PATH {
        return response;
    }

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16().to_string();

    counter!(
        settings.metric_name("endpoint_request_count"),
        "app" => settings.app.clone(),
        "name" => name.clone(),
        "method" => method.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        settings.metric_name("endpoint_duration_milliseconds"),
        "app" => settings.app.clone(),
        "name" => name,
        "method" => method,
        "status" => status
    )
    .record(duration_ms);

    response
}
