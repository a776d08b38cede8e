//! The HTTP collaborator the client is built on.
//!
//! [`HttpTransport`] is the injected seam: `get`, `post` and `put` take an
//! [`HttpRequest`] and resolve to the parsed response body, or a
//! [`TransportError`] carrying the status and server message for non-2xx
//! responses. [`ReqwestTransport`] is the default implementation.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    errors::{Error, Result, RunServiceError, TransportError, TransportErrorKind},
    http::{parse_body, parse_error_response, request_id_from_headers, HeaderList},
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
    DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
};

/// A boxed future returned by transport methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a single transport call.
pub type TransportResult = std::result::Result<Value, TransportError>;

/// One outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub uri: String,
    pub headers: HeaderList,
    /// Skip any authentication the transport would add on its own.
    pub no_auth: bool,
}

impl HttpRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers = self.headers.with(key, value);
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.no_auth = true;
        self
    }
}

pub trait HttpTransport: Send + Sync {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult>;
    fn post(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult>;
    fn put(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult>;
}

/// The verbs a transport supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
}

impl HttpVerb {
    /// Case-insensitive mapping from a method name.
    pub fn parse(method: &str) -> Result<Self> {
        let method = method.trim().to_ascii_lowercase();
        match method.as_str() {
            "get" => Ok(HttpVerb::Get),
            "post" => Ok(HttpVerb::Post),
            "put" => Ok(HttpVerb::Put),
            _ => Err(Error::UnsupportedOperation { method }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
        }
    }

    pub fn dispatch<'a>(
        &self,
        transport: &'a dyn HttpTransport,
        request: HttpRequest,
    ) -> BoxFuture<'a, TransportResult> {
        match self {
            HttpVerb::Get => transport.get(request),
            HttpVerb::Post => transport.post(request),
            HttpVerb::Put => transport.put(request),
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send `request` with the transport verb named by `method`.
///
/// Unsupported methods fail with [`Error::UnsupportedOperation`] before the
/// transport is touched. Transport failures come back unchanged as the inner
/// error so the caller can attach its operation name.
pub async fn send_by_method(
    transport: &dyn HttpTransport,
    method: &str,
    request: HttpRequest,
) -> Result<TransportResult> {
    let verb = HttpVerb::parse(method)?;
    Ok(verb.dispatch(transport, request).await)
}

/// Default transport over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    client_header: String,
    default_headers: HeaderList,
    telemetry: Telemetry,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("client_header", &self.client_header)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    fn request_builder(
        &self,
        method: Method,
        request: &HttpRequest,
    ) -> Result<reqwest::RequestBuilder> {
        let url = reqwest::Url::parse(&request.uri)
            .map_err(|err| Error::Config(format!("invalid request uri '{}': {err}", request.uri)))?;
        let mut builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("X-Run-History-Client", self.client_header.as_str());

        if !request.no_auth {
            builder = apply_header_list(builder, &self.default_headers)?;
        }
        apply_header_list(builder, &request.headers)
    }

    async fn execute(&self, method: Method, request: HttpRequest) -> TransportResult {
        #[cfg(feature = "tracing")]
        {
            use tracing::Instrument;
            let span = tracing::debug_span!("run_history.http", method = %method, uri = %request.uri);
            self.send(method, request).instrument(span).await
        }
        #[cfg(not(feature = "tracing"))]
        {
            self.send(method, request).await
        }
    }

    async fn send(&self, method: Method, request: HttpRequest) -> TransportResult {
        let ctx = RequestContext::new(method.as_str(), request.uri.as_str());
        let builder = self
            .request_builder(method, &request)
            .map_err(|err| TransportError::new(TransportErrorKind::Request, err.to_string()))?;

        let start = Instant::now();
        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(err) => return Err(self.failed(start, None, err, ctx)),
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let ctx = ctx.with_request_id(request_id_from_headers(&headers));
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(err) => return Err(self.failed(start, Some(status.as_u16()), err, ctx)),
        };

        if !status.is_success() {
            self.record(
                start,
                Some(status.as_u16()),
                Some(format!("http {}", status.as_u16())),
                ctx,
            );
            #[cfg(feature = "tracing")]
            tracing::warn!(status = %status, "request failed");
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(parse_error_response(status, &headers, text));
        }

        self.record(start, Some(status.as_u16()), None, ctx);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            status = %status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );
        Ok(parse_body(&body))
    }

    /// Record and log a request that died in the transport layer.
    fn failed(
        &self,
        start: Instant,
        status: Option<u16>,
        err: reqwest::Error,
        context: RequestContext,
    ) -> TransportError {
        let mut err = TransportError::from_reqwest(err);
        err.request_id = context.request_id.clone();
        self.record(start, status, Some(err.message.clone()), context);
        #[cfg(feature = "tracing")]
        tracing::warn!(status = ?status, error = %err, "transport error");
        err
    }

    fn record(
        &self,
        start: Instant,
        status: Option<u16>,
        error: Option<String>,
        context: RequestContext,
    ) {
        if self.telemetry.http_enabled() {
            self.telemetry.record_http(HttpRequestMetrics {
                latency: start.elapsed(),
                status,
                error,
                context,
            });
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(self.execute(Method::GET, request))
    }

    fn post(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(self.execute(Method::POST, request))
    }

    fn put(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(self.execute(Method::PUT, request))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportBuilder {
    http_client: Option<reqwest::Client>,
    connect_timeout: Option<Duration>,
    client_header: Option<String>,
    default_headers: HeaderList,
    metrics: Option<MetricsCallbacks>,
}

impl ReqwestTransportBuilder {
    /// Reuse an existing `reqwest::Client`; the connect timeout is then ignored.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn client_header(mut self, value: impl Into<String>) -> Self {
        self.client_header = Some(value.into());
        self
    }

    /// Headers sent with every request that does not set `no_auth`.
    pub fn default_headers(mut self, headers: HeaderList) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn metrics(mut self, metrics: MetricsCallbacks) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .build()
                .map_err(|err| Error::Config(format!("failed to build http client: {err}")))?,
        };
        let client_header = self
            .client_header
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());
        Ok(ReqwestTransport {
            http,
            client_header,
            default_headers: self.default_headers,
            telemetry: Telemetry::new(self.metrics),
        })
    }
}

/// Shared call path for every client operation: optional auth header, request
/// timeout, and normalization of transport failures into [`RunServiceError`].
#[derive(Clone)]
pub(crate) struct Gateway {
    transport: Arc<dyn HttpTransport>,
    access_token: Option<String>,
    timeout: Option<Duration>,
}

impl Gateway {
    pub(crate) fn new(
        transport: Arc<dyn HttpTransport>,
        access_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            access_token,
            timeout,
        }
    }

    /// A request carrying the raw access token as its `Authorization` header.
    pub(crate) fn authorized(&self, uri: impl Into<String>) -> HttpRequest {
        let request = HttpRequest::new(uri);
        match &self.access_token {
            Some(token) => request.with_header(AUTHORIZATION.as_str(), token.as_str()),
            None => request,
        }
    }

    pub(crate) async fn get(&self, operation: &'static str, request: HttpRequest) -> Result<Value> {
        self.call(operation, HttpVerb::Get.as_str(), request).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: HttpRequest,
    ) -> Result<T> {
        let body = self.get(operation, request).await?;
        serde_json::from_value(body).map_err(Error::Serialization)
    }

    pub(crate) async fn call(
        &self,
        operation: &'static str,
        method: &str,
        request: HttpRequest,
    ) -> Result<Value> {
        #[cfg(feature = "tracing")]
        tracing::debug!(operation, method, uri = %request.uri, "run history request");
        let pending = send_by_method(self.transport.as_ref(), method, request);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| RunServiceError::timeout(operation, limit))??,
            None => pending.await?,
        };
        outcome.map_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::warn!(operation, status = ?err.status, error = %err, "run history request failed");
            RunServiceError::from_transport(operation, err).into()
        })
    }
}

fn apply_header_list(
    mut builder: reqwest::RequestBuilder,
    headers: &HeaderList,
) -> Result<reqwest::RequestBuilder> {
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        builder = builder.header(name, val);
    }
    Ok(builder)
}
