//! In-memory transport for offline tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{
    errors::{TransportError, TransportErrorKind},
    transport::{BoxFuture, HttpRequest, HttpTransport, HttpVerb, TransportResult},
};

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub verb: HttpVerb,
    pub request: HttpRequest,
}

/// Transport that replays queued responses in order and records every request.
///
/// Clones share the same queue and log.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: Mutex<VecDeque<TransportResult>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, body: Value) -> Self {
        self.push_ok(body);
        self
    }

    pub fn with_error(self, err: TransportError) -> Self {
        self.push_err(err);
        self
    }

    pub fn push_ok(&self, body: Value) {
        self.inner
            .responses
            .lock()
            .expect("lock poisoned")
            .push_back(Ok(body));
    }

    pub fn push_err(&self, err: TransportError) {
        self.inner
            .responses
            .lock()
            .expect("lock poisoned")
            .push_back(Err(err));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().expect("lock poisoned").clone()
    }

    fn respond(&self, verb: HttpVerb, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        self.inner
            .requests
            .lock()
            .expect("lock poisoned")
            .push(RecordedRequest { verb, request });
        let next = self
            .inner
            .responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::new(
                    TransportErrorKind::Other,
                    "no mock response queued",
                ))
            });
        Box::pin(async move { next })
    }
}

impl HttpTransport for MockTransport {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        self.respond(HttpVerb::Get, request)
    }

    fn post(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        self.respond(HttpVerb::Post, request)
    }

    fn put(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        self.respond(HttpVerb::Put, request)
    }
}
