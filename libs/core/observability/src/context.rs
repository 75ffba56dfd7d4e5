//! Request-scoped metadata attached to log lines.

use std::sync::Mutex;

/// Metadata describing the operation a log line belongs to.
///
/// Threaded explicitly through calls instead of being hidden in an opaque
/// context bag. Every field is optional; missing ones are left out of the
/// log line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub query_id: Option<String>,
    pub verb: Option<String>,
    pub path: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = non_empty(query_id.into());
        self
    }

    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = non_empty(verb.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = non_empty(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query_id.is_none() && self.verb.is_none() && self.path.is_none()
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Generates `<prefix>-<n>` identifiers from a shared counter starting at 0.
#[derive(Debug, Default)]
pub struct QueryIdGenerator {
    counter: Mutex<u64>,
}

impl QueryIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, prefix: &str) -> String {
        // A poisoned counter is still a valid counter.
        let mut count = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        let id = format!("{}-{}", prefix, *count);
        *count += 1;
        id
    }
}
