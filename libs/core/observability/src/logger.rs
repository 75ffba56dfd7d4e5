//! Structured logger handed to components at construction time.

use crate::context::{QueryIdGenerator, RequestContext};
use core_config::LogConfig;
use std::sync::Arc;
use tracing::Span;

/// Builds spans carrying the standard log fields:
/// `queryID`, `verb`, `path`, `hostname` and `method`.
///
/// Cheap to clone; clones share the query-id counter.
#[derive(Clone, Debug)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

#[derive(Debug)]
struct LoggerInner {
    hostname: Option<String>,
    query_ids: QueryIdGenerator,
}

impl Logger {
    pub fn new(config: &LogConfig) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                hostname: config.hostname.clone(),
                query_ids: QueryIdGenerator::new(),
            }),
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.inner.hostname.as_deref()
    }

    /// Build request metadata. An empty `prefix` means no query id is generated.
    pub fn request_context(&self, prefix: &str, verb: &str, path: &str) -> RequestContext {
        let ctx = RequestContext::new().with_verb(verb).with_path(path);
        if prefix.is_empty() {
            ctx
        } else {
            ctx.with_query_id(self.inner.query_ids.next_id(prefix))
        }
    }

    /// Span for work that is not tied to a request.
    pub fn span(&self, method: &str) -> Span {
        self.request_span(&RequestContext::default(), method)
    }

    /// Span for work done on behalf of `request`.
    pub fn request_span(&self, request: &RequestContext, method: &str) -> Span {
        // Error level so the fields survive whatever level filter is installed.
        tracing::error_span!(
            "ctx",
            queryID = request.query_id.as_deref(),
            verb = request.verb.as_deref(),
            path = request.path.as_deref(),
            hostname = self.inner.hostname.as_deref(),
            method = method,
        )
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(&LogConfig::default())
    }
}
