use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured validation error raised before any request is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Broad transport failure kinds for classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The server answered with a non-2xx status.
    Http,
    Timeout,
    Connect,
    Request,
    /// The response body could not be read.
    Decode,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Http => "http",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Decode => "decode",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Failure reported by an [`HttpTransport`](crate::HttpTransport).
///
/// Non-2xx responses carry the status and, when the body has the
/// `{ "error": { "code", "message" } }` envelope, the server-provided fields.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub server_message: Option<String>,
    pub request_id: Option<String>,
    pub raw_body: Option<String>,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            server_message: None,
            request_id: None,
            raw_body: None,
            source: None,
        }
    }

    /// A non-2xx response with an optional server message.
    pub fn http(status: u16, server_message: Option<String>) -> Self {
        let message = server_message
            .clone()
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self {
            status: Some(status),
            server_message,
            ..Self::new(TransportErrorKind::Http, message)
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else if err.is_decode() || err.is_body() {
            TransportErrorKind::Decode
        } else {
            TransportErrorKind::Other
        };
        let message = err.to_string();
        let status = err.status().map(|s| s.as_u16());
        Self {
            status,
            source: Some(err.without_url()),
            ..Self::new(kind, message)
        }
    }
}

/// The single error shape for a failed run-history call.
///
/// Built by [`RunServiceError::from_transport`] at every transport call site, so
/// the status code, the server message and the transport message all survive.
#[derive(Debug)]
pub struct RunServiceError {
    pub operation: &'static str,
    pub kind: TransportErrorKind,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
    pub server_message: Option<String>,
    pub request_id: Option<String>,
    pub source: Option<TransportError>,
}

impl RunServiceError {
    pub fn from_transport(operation: &'static str, err: TransportError) -> Self {
        Self {
            operation,
            kind: err.kind,
            status: err.status,
            code: err.code.clone(),
            message: err.message.clone(),
            server_message: err.server_message.clone(),
            request_id: err.request_id.clone(),
            source: Some(err),
        }
    }

    pub(crate) fn timeout(operation: &'static str, after: std::time::Duration) -> Self {
        Self {
            operation,
            kind: TransportErrorKind::Timeout,
            status: None,
            code: None,
            message: format!("no response after {}ms", after.as_millis()),
            server_message: None,
            request_id: None,
            source: None,
        }
    }
}

impl fmt::Display for RunServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.operation)?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(server) = &self.server_message {
            if server != &self.message {
                write!(f, " [{server}]")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RunServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias for fallible client results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("unsupported operation: http method '{method}'")]
    UnsupportedOperation { method: String },

    #[error("{0}")]
    RunService(#[from] RunServiceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status of the failed call, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RunService(err) => err.status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_formats_with_field() {
        let err = ValidationError::new("is required").with_field("uri");
        assert_eq!(err.to_string(), "uri: is required");
    }

    #[test]
    fn run_service_error_keeps_every_field() {
        let mut transport = TransportError::http(409, Some("workflow is disabled".into()));
        transport.message = "Conflict".into();
        transport.code = Some("WorkflowDisabled".into());

        let err = RunServiceError::from_transport("run_trigger", transport);
        assert_eq!(err.operation, "run_trigger");
        assert_eq!(err.status, Some(409));
        assert_eq!(err.code.as_deref(), Some("WorkflowDisabled"));
        assert_eq!(err.message, "Conflict");
        assert_eq!(err.server_message.as_deref(), Some("workflow is disabled"));
        assert_eq!(
            err.to_string(),
            "run_trigger failed (409): Conflict [workflow is disabled]"
        );
    }

    #[test]
    fn http_transport_error_falls_back_to_status_text() {
        let err = TransportError::http(500, None);
        assert_eq!(err.message, "request failed with status 500");
        assert_eq!(err.kind, TransportErrorKind::Http);
    }

    #[test]
    fn error_status_only_for_run_service_failures() {
        let err: Error = RunServiceError::from_transport(
            "get_run",
            TransportError::http(404, Some("not found".into())),
        )
        .into();
        assert_eq!(err.status(), Some(404));
        assert_eq!(Error::Config("x".into()).status(), None);
    }

    #[test]
    fn unsupported_operation_names_method() {
        let err = Error::UnsupportedOperation {
            method: "delete".into(),
        };
        assert!(err.to_string().contains("'delete'"));
    }
}
