//! Document Lookup Service
//!
//! A small HTTP service answering single-document lookups from MongoDB.
//! It starts serving immediately, even when MongoDB is down: requests wait
//! for the connection up to the request timeout.
//!
//! ## Endpoints
//!
//! - `GET /documents/{database}/{collection}?field=value` - first matching document
//! - `GET /healthcheck` - 200 once connected, 503 otherwise, with the build commit
//! - `GET /metrics` - Prometheus metrics, also served on `METRICS_PORT` when set

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use bson::oid::ObjectId;
use bson::{Bson, Document};
use core_config::{COMMIT_ID, Environment, FromEnv, LogConfig, MongoConfig, ServerConfig};
use eyre::{Result, WrapErr};
use mongo_manager::mongodb::connect_managed;
use mongo_manager::{ConnectionManager, Connector, Context, ManagerError};
use observability::middleware::{
    MetricsSettings, metrics_middleware, panic_recovery_layer, query_id_middleware,
};
use observability::{Logger, MetricsServer, RequestContext, init_metrics, metrics_handler};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Name reported in the endpoint metrics
pub const APP_NAME: &str = "mongo_lookup";

/// Shared handler state
pub struct AppState<C: Connector> {
    pub manager: ConnectionManager<C>,
    pub request_timeout: Duration,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(manager: ConnectionManager<C>, request_timeout: Duration) -> Self {
        Self {
            manager,
            request_timeout,
        }
    }
}

/// Manager errors as HTTP responses
#[derive(Debug)]
pub struct ApiError(pub ManagerError);

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.root_cause() {
            ManagerError::NotFound => StatusCode::NOT_FOUND,
            ManagerError::ResourceUnavailable { .. } => StatusCode::BAD_REQUEST,
            ManagerError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ManagerError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Lookup failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Build the lookup filter from query parameters.
///
/// Every value is matched as a string, except `_id` which is matched as an
/// ObjectId when it parses as one.
pub fn filter_from_params(params: HashMap<String, String>) -> Document {
    let mut filter = Document::new();
    for (key, value) in params {
        let value = match ObjectId::parse_str(&value) {
            Ok(oid) if key == "_id" => Bson::ObjectId(oid),
            _ => Bson::String(value),
        };
        filter.insert(key, value);
    }
    filter
}

async fn find_document<C: Connector>(
    State(state): State<AppState<C>>,
    Extension(request): Extension<RequestContext>,
    Path((database, collection)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ctx = Context::with_timeout(state.request_timeout).with_request(request);

    let document: Document = state
        .manager
        .find_one(&ctx, &database, &collection, Some(filter_from_params(params)))
        .await?;

    Ok(Json(Bson::Document(document).into_relaxed_extjson()))
}

async fn healthcheck<C: Connector>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (status, label) = if state.manager.is_connected() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not connected")
    };

    let body = serde_json::json!({ "status": label, "commit": COMMIT_ID });
    (status, Json(body))
}

/// Routes plus the logging, metrics and panic recovery middleware
pub fn router<C: Connector>(
    state: AppState<C>,
    logger: Logger,
    metrics: MetricsSettings,
) -> Router {
    Router::new()
        .route("/documents/{database}/{collection}", get(find_document::<C>))
        .route("/healthcheck", get(healthcheck::<C>))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(middleware::from_fn_with_state(logger, query_id_middleware))
        .layer(panic_recovery_layer())
}

/// Run the lookup service
///
/// 1. Sets up structured logging from `LOG_FORMAT`/`LOG_LEVEL`/`HOSTNAME`
/// 2. Starts connecting to MongoDB in the background
/// 3. Serves HTTP (and `/metrics` on `METRICS_PORT` when set) until SIGINT/SIGTERM
/// 4. Closes the MongoDB connection and the metrics listener within
///    `SHUTDOWN_TIMEOUT_SECS`
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    let log_config = LogConfig::from_env().wrap_err("Failed to load logging configuration")?;
    core_config::tracing::init_tracing(&log_config);

    init_metrics().wrap_err("Failed to install metrics recorder")?;

    info!(environment = ?environment, commit = COMMIT_ID, "Starting document lookup service");

    let server = ServerConfig::from_env().wrap_err("Failed to load server configuration")?;
    let mongo = MongoConfig::from_env().wrap_err("Failed to load MongoDB configuration")?;

    let logger = Logger::new(&log_config);
    let manager = connect_managed(mongo, logger.clone());

    let metrics_server = MetricsServer::new();
    if let Some(port) = server.metrics_port {
        metrics_server
            .start((server.host.as_str(), port))
            .wrap_err("Failed to start metrics server")?;
    }

    let mut metrics = MetricsSettings::new(APP_NAME);
    if let Some(namespace) = &server.metrics_namespace {
        metrics = metrics.with_namespace(namespace.clone());
    }

    let app = router(
        AppState::new(manager.clone(), server.request_timeout()),
        logger,
        metrics,
    );

    let listener = TcpListener::bind(server.address())
        .await
        .wrap_err_with(|| format!("Failed to bind server to {}", server.address()))?;
    info!(address = %server.address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server failed")?;

    manager
        .shutdown(&Context::with_timeout(server.shutdown_timeout()))
        .await
        .wrap_err("Failed to close MongoDB connection")?;

    if server.metrics_port.is_some() {
        metrics_server
            .shutdown(server.shutdown_timeout())
            .await
            .wrap_err("Failed to stop metrics server")?;
    }

    info!("Document lookup service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use mongo_manager::ContextError;
    use mongo_manager::mongodb::{MongoConnector, MongoManager};
    use tower::ServiceExt;

    /// A manager that can never connect
    fn unreachable() -> MongoManager {
        ConnectionManager::new(
            MongoConnector::new(MongoConfig::new("")),
            Logger::default(),
        )
    }

    fn app(manager: MongoManager) -> Router {
        router(
            AppState::new(manager, Duration::from_secs(2)),
            Logger::default(),
            MetricsSettings::new(APP_NAME),
        )
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_times_out_while_connecting() {
        let status = get_status(app(unreachable()), "/documents/shop/orders?number=1").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_after_giving_up_is_unavailable() {
        let manager = unreachable();
        manager.shutdown(&Context::background()).await.unwrap();

        let status = get_status(app(manager), "/documents/shop/orders").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthcheck_reports_not_connected() {
        let response = app(unreachable())
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "not connected");
        assert_eq!(body["commit"], COMMIT_ID);
    }

    #[test]
    fn test_error_status_mapping() {
        let wrapped = |source| ManagerError::Collection {
            database: "shop".to_string(),
            resource: "orders".to_string(),
            source: Box::new(source),
        };

        assert_eq!(ApiError(ManagerError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError(wrapped(ManagerError::NotConnected)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(wrapped(ManagerError::Cancelled(ContextError::DeadlineExceeded))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError(wrapped(ManagerError::ResourceUnavailable {
                database: "shop".to_string(),
                resource: "$cmd".to_string(),
            }))
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(ManagerError::DecodeFailed("bad".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_filter_from_params() {
        let oid = ObjectId::new();
        let params = HashMap::from([
            ("_id".to_string(), oid.to_hex()),
            ("customer".to_string(), "ada".to_string()),
            ("number".to_string(), "7".to_string()),
        ]);

        let filter = filter_from_params(params);
        assert_eq!(filter.get("_id"), Some(&Bson::ObjectId(oid)));
        assert_eq!(filter.get_str("customer").unwrap(), "ada");
        assert_eq!(filter.get_str("number").unwrap(), "7");
    }

    #[test]
    fn test_malformed_object_id_matches_as_string() {
        let params = HashMap::from([("_id".to_string(), "not-an-oid".to_string())]);
        let filter = filter_from_params(params);
        assert_eq!(filter.get_str("_id").unwrap(), "not-an-oid");
    }
}
