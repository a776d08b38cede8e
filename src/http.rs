use reqwest::{header::HeaderMap, StatusCode};
use serde_json::Value;

use crate::{
    errors::{TransportError, TransportErrorKind},
    REQUEST_ID_HEADERS,
};

/// Ordered list of request headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry. Entries with an empty key or value are ignored.
    pub fn push(&mut self, entry: HeaderEntry) {
        if entry.is_valid() {
            self.0.push(entry);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(HeaderEntry::new(key, value));
        self
    }

    /// Last value set for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|entry| entry.key.trim().eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

pub(crate) fn request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    REQUEST_ID_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}

/// Decode a successful response body. Non-JSON bodies come back as a string.
pub(crate) fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Build a [`TransportError`] from a non-2xx response.
///
/// Recognizes `{ "error": { "code", "message" } }` and a flat `{ "code", "message" }`.
pub(crate) fn parse_error_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> TransportError {
    let status_text = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let mut err = TransportError::new(TransportErrorKind::Http, status_text);
    err.status = Some(status.as_u16());
    err.request_id = request_id_from_headers(headers);

    if body.is_empty() {
        return err;
    }

    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        let envelope = value
            .get("error")
            .filter(|v| v.is_object())
            .unwrap_or(&value);
        err.code = envelope
            .get("code")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        err.server_message = envelope
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
    }

    err.raw_body = Some(body);
    err
}
