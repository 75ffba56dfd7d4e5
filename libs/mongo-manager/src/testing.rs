//! In-memory session backend for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::Document;

use crate::common::{Instant, SessionError};
use crate::session::{Connector, Resource, Session};

/// Observes what the fake backend was asked to do
#[derive(Clone, Default)]
pub(crate) struct CallLog {
    attempt_times: Arc<Mutex<Vec<Instant>>>,
    disconnects: Arc<AtomicUsize>,
}

impl CallLog {
    pub(crate) fn attempts(&self) -> usize {
        self.attempt_times.lock().unwrap().len()
    }

    pub(crate) fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().unwrap().clone()
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

type Documents = Arc<Vec<(String, String, Document)>>;

pub(crate) struct FakeConnector {
    /// Number of attempts that fail before one succeeds; `None` fails forever
    failures: Option<usize>,
    latency: Duration,
    disconnect_latency: Duration,
    disconnect_error: Option<String>,
    documents: Vec<(String, String, Document)>,
    calls: CallLog,
}

impl FakeConnector {
    pub(crate) fn succeeding() -> Self {
        Self::failing_times(0)
    }

    pub(crate) fn failing_times(failures: usize) -> Self {
        Self {
            failures: Some(failures),
            latency: Duration::ZERO,
            disconnect_latency: Duration::ZERO,
            disconnect_error: None,
            documents: Vec::new(),
            calls: CallLog::default(),
        }
    }

    pub(crate) fn always_failing() -> Self {
        Self {
            failures: None,
            ..Self::succeeding()
        }
    }

    pub(crate) fn with_attempt_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn with_disconnect_latency(mut self, latency: Duration) -> Self {
        self.disconnect_latency = latency;
        self
    }

    pub(crate) fn with_disconnect_error(mut self, message: &str) -> Self {
        self.disconnect_error = Some(message.to_string());
        self
    }

    pub(crate) fn with_document(mut self, database: &str, resource: &str, doc: Document) -> Self {
        self.documents
            .push((database.to_string(), resource.to_string(), doc));
        self
    }

    pub(crate) fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    fn endpoint(&self) -> String {
        "fake:27017".to_string()
    }

    async fn connect(&self) -> Result<FakeSession, SessionError> {
        let attempt = {
            let mut times = self.calls.attempt_times.lock().unwrap();
            times.push(Instant::now());
            times.len()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.failures {
            Some(failures) if attempt > failures => Ok(FakeSession {
                documents: Arc::new(self.documents.clone()),
                disconnect_latency: self.disconnect_latency,
                disconnect_error: self.disconnect_error.clone(),
                calls: self.calls.clone(),
            }),
            _ => Err(SessionError::new(format!(
                "connection refused (attempt {})",
                attempt
            ))),
        }
    }
}

pub(crate) struct FakeSession {
    documents: Documents,
    disconnect_latency: Duration,
    disconnect_error: Option<String>,
    calls: CallLog,
}

impl FakeSession {
    /// Collection name that never resolves
    pub(crate) const MISSING: &'static str = "missing";
    /// Collection name whose lookups fail
    pub(crate) const BROKEN: &'static str = "broken";
}

#[async_trait]
impl Session for FakeSession {
    type Resource = FakeResource;

    fn resolve(&self, database: &str, resource: &str) -> Option<FakeResource> {
        if database.is_empty() || resource == Self::MISSING {
            return None;
        }

        Some(FakeResource {
            database: database.to_string(),
            resource: resource.to_string(),
            documents: self.documents.clone(),
        })
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        if !self.disconnect_latency.is_zero() {
            tokio::time::sleep(self.disconnect_latency).await;
        }
        match &self.disconnect_error {
            Some(message) => Err(SessionError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeResource {
    database: String,
    resource: String,
    documents: Documents,
}

impl FakeResource {
    pub(crate) fn name(&self) -> (String, String) {
        (self.database.clone(), self.resource.clone())
    }
}

#[async_trait]
impl Resource for FakeResource {
    async fn find_one(&self, filter: Document) -> Result<Option<Document>, SessionError> {
        if self.resource == FakeSession::BROKEN {
            return Err(SessionError::new("cursor killed"));
        }

        let found = self
            .documents
            .iter()
            .filter(|(db, coll, _)| db == &self.database && coll == &self.resource)
            .map(|(_, _, doc)| doc)
            .find(|doc| filter.iter().all(|(key, value)| doc.get(key) == Some(value)))
            .cloned();

        Ok(found)
    }
}
