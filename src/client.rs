use std::{fmt, sync::Arc, time::Duration};

use futures_core::Stream;
use futures_util::{stream, TryStreamExt};
use serde_json::Value;

use crate::{
    errors::{Error, Result, ValidationError},
    http::HeaderList,
    parameters::parse_action_link,
    source::{fetch_content, FixtureRunSource, HttpRunSource, RunSource},
    telemetry::MetricsCallbacks,
    transport::{Gateway, HttpRequest, HttpTransport, ReqwestTransport},
    types::{
        ActionFixtures, ActionLinks, ActionPayloads, ActionRef, CallbackInfo, ContentLink,
        PagedResources, RepetitionList, Run, RunRepetition, Runs,
    },
    url_builder::Endpoints,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Configuration for [`RunHistoryClient`]. Immutable once the client is built.
#[derive(Clone)]
pub struct RunServiceOptions {
    pub base_url: String,
    pub api_version: String,
    pub workflow_name: String,
    /// Sent verbatim as the `Authorization` header value.
    pub access_token: Option<String>,
    /// Serve repetitions and action payloads from fixtures instead of the network.
    pub is_dev: bool,
    /// Fixture payloads keyed by node id (dev mode only).
    pub fixtures: ActionFixtures,
    /// Injected transport; a [`ReqwestTransport`] is built when absent.
    pub http_client: Option<Arc<dyn HttpTransport>>,
    /// Per-call deadline (defaults to 60s). `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Connect timeout for the default transport (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Extra headers the default transport sends on authenticated requests.
    pub default_headers: HeaderList,
    /// Overrides the `X-Run-History-Client` header of the default transport.
    pub client_header: Option<String>,
    /// Metrics callbacks for the default transport.
    pub metrics: Option<MetricsCallbacks>,
}

impl Default for RunServiceOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_version: String::new(),
            workflow_name: String::new(),
            access_token: None,
            is_dev: false,
            fixtures: ActionFixtures::new(),
            http_client: None,
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: None,
            default_headers: HeaderList::new(),
            client_header: None,
            metrics: None,
        }
    }
}

impl fmt::Debug for RunServiceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunServiceOptions")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("workflow_name", &self.workflow_name)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("is_dev", &self.is_dev)
            .field("fixtures", &self.fixtures.len())
            .field("http_client", &self.http_client.as_ref().map(|_| "custom"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl RunServiceOptions {
    pub fn new(base_url: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: api_version.into(),
            ..Default::default()
        }
    }

    pub fn with_workflow(mut self, workflow_name: impl Into<String>) -> Self {
        self.workflow_name = workflow_name.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_dev_mode(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    pub fn with_fixtures(mut self, fixtures: ActionFixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_http_client(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_client = Some(transport);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers = self.default_headers.with(key, value);
        self
    }

    pub fn with_client_header(mut self, value: impl Into<String>) -> Self {
        self.client_header = Some(value.into());
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCallbacks) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Client for the workflow run-history API.
///
/// Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct RunHistoryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoints: Endpoints,
    gateway: Gateway,
    source: Arc<dyn RunSource>,
}

impl fmt::Debug for RunHistoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHistoryClient")
            .field("endpoints", &self.inner.endpoints)
            .field("is_dev", &self.is_dev())
            .finish_non_exhaustive()
    }
}

enum PageCursor {
    First,
    Next(String),
    Done,
}

impl RunHistoryClient {
    /// Build a client. Fails with [`Error::Config`] when the base URL or API
    /// version is missing.
    pub fn new(opts: RunServiceOptions) -> Result<Self> {
        Self::build(opts, None)
    }

    /// Build a client around a custom [`RunSource`], ignoring `is_dev`.
    pub fn with_source(opts: RunServiceOptions, source: Arc<dyn RunSource>) -> Result<Self> {
        Self::build(opts, Some(source))
    }

    fn build(opts: RunServiceOptions, source: Option<Arc<dyn RunSource>>) -> Result<Self> {
        let base_url = opts.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("base url is required".to_string()));
        }
        reqwest::Url::parse(base_url)
            .map_err(|err| Error::Config(format!("invalid base url: {err}")))?;
        let api_version = opts.api_version.trim();
        if api_version.is_empty() {
            return Err(Error::Config("api version is required".to_string()));
        }

        let endpoints = Endpoints {
            base_url: base_url.to_string(),
            api_version: api_version.to_string(),
            workflow_name: opts.workflow_name.trim().to_string(),
        };

        let transport: Arc<dyn HttpTransport> = match opts.http_client {
            Some(transport) => transport,
            None => {
                let mut builder = ReqwestTransport::builder().default_headers(opts.default_headers);
                if let Some(timeout) = opts.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                if let Some(header) = opts.client_header {
                    builder = builder.client_header(header);
                }
                if let Some(metrics) = opts.metrics {
                    builder = builder.metrics(metrics);
                }
                Arc::new(builder.build()?)
            }
        };
        let access_token = opts.access_token.filter(|s| !s.trim().is_empty());
        let gateway = Gateway::new(transport, access_token, opts.timeout);

        let source: Arc<dyn RunSource> = match source {
            Some(source) => source,
            None if opts.is_dev => Arc::new(FixtureRunSource::new(opts.fixtures)),
            None => Arc::new(HttpRunSource::new(gateway.clone(), endpoints.clone())),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            base_url = %endpoints.base_url,
            api_version = %endpoints.api_version,
            fixture = source.is_fixture(),
            "run history client ready"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoints,
                gateway,
                source,
            }),
        })
    }

    /// Whether repetitions and action payloads come from fixtures.
    pub fn is_dev(&self) -> bool {
        self.inner.source.is_fixture()
    }

    /// Fetch the content behind a link, unauthenticated.
    pub async fn get_content(&self, link: &ContentLink) -> Result<Value> {
        fetch_content(&self.inner.gateway, link).await
    }

    /// Fetch one run with its actions and workflow properties expanded.
    pub async fn get_run(&self, run_id: &str) -> Result<Run> {
        let uri = self.inner.endpoints.run(run_id)?;
        let request = self.inner.gateway.authorized(uri);
        self.inner.gateway.get_json("get_run", request).await
    }

    /// First page of runs for the configured workflow.
    pub async fn get_runs(&self) -> Result<Runs> {
        let request = self.inner.gateway.authorized(self.inner.endpoints.runs());
        let page: PagedResources<Run> = self.inner.gateway.get_json("get_runs", request).await?;
        Ok(page.into())
    }

    /// Follow a server-issued `next_link` verbatim.
    pub async fn get_more_runs(&self, continuation_token: &str) -> Result<Runs> {
        let token = continuation_token.trim();
        if token.is_empty() {
            return Err(Error::Validation(
                ValidationError::new("continuation token is required")
                    .with_field("continuation_token"),
            ));
        }
        let request = self.inner.gateway.authorized(token);
        let page: PagedResources<Run> = self
            .inner
            .gateway
            .get_json("get_more_runs", request)
            .await?;
        Ok(page.into())
    }

    /// Stream every page of runs, following `next_link` until the server omits it.
    ///
    /// The stream ends after the first error.
    pub fn run_pages(&self) -> impl Stream<Item = Result<Runs>> + Send + 'static {
        let client = self.clone();
        stream::unfold(PageCursor::First, move |cursor| {
            let client = client.clone();
            async move {
                let page = match cursor {
                    PageCursor::First => client.get_runs().await,
                    PageCursor::Next(link) => client.get_more_runs(&link).await,
                    PageCursor::Done => return None,
                };
                let next = match &page {
                    Ok(runs) => runs
                        .next_link
                        .clone()
                        .map(PageCursor::Next)
                        .unwrap_or(PageCursor::Done),
                    Err(_) => PageCursor::Done,
                };
                Some((page, next))
            }
        })
    }

    /// All runs across all pages, in server order.
    pub async fn list_all_runs(&self) -> Result<Vec<Run>> {
        let mut pages = Box::pin(self.run_pages());
        let mut runs = Vec::new();
        while let Some(page) = pages.try_next().await? {
            runs.extend(page.runs);
        }
        Ok(runs)
    }

    /// Repetitions of a scoped action. Empty in dev mode.
    pub async fn get_scope_repetitions(
        &self,
        action: &ActionRef,
        status: Option<&str>,
    ) -> Result<RepetitionList> {
        self.inner.source.scope_repetitions(action, status).await
    }

    pub async fn get_repetition(
        &self,
        action: &ActionRef,
        repetition_id: &str,
    ) -> Result<RunRepetition> {
        let uri = self.inner.endpoints.repetition(action, repetition_id)?;
        let request = self.inner.gateway.authorized(uri);
        self.inner
            .gateway
            .get_json("get_repetition", request)
            .await
    }

    /// Invoke a workflow trigger through its callback descriptor.
    pub async fn run_trigger(&self, callback: &CallbackInfo) -> Result<Value> {
        let uri = callback.uri().ok_or_else(|| {
            Error::Validation(
                ValidationError::new("callback info has no resolvable uri").with_field("uri"),
            )
        })?;
        self.inner
            .gateway
            .call("run_trigger", callback.method(), HttpRequest::new(uri))
            .await
    }

    /// Normalized inputs and outputs of an action.
    pub async fn get_action_links(
        &self,
        links: &ActionLinks,
        node_id: &str,
    ) -> Result<ActionPayloads> {
        let raw = self.inner.source.action_payloads(links, node_id).await?;
        Ok(ActionPayloads {
            inputs: parse_action_link(raw.inputs.as_ref(), true),
            outputs: parse_action_link(raw.outputs.as_ref(), false),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::{
        errors::{TransportError, TransportErrorKind},
        mock::MockTransport,
        parameters::ParameterValue,
        transport::{BoxFuture, HttpVerb, TransportResult},
        types::ActionFixture,
    };

    const BASE: &str = "https://mgmt.example.test/api/management";

    fn options(transport: &MockTransport) -> RunServiceOptions {
        RunServiceOptions::new(BASE, "2018-11-01")
            .with_workflow("orders")
            .with_access_token("token-1")
            .with_http_client(Arc::new(transport.clone()))
    }

    fn client(transport: &MockTransport) -> RunHistoryClient {
        RunHistoryClient::new(options(transport)).unwrap()
    }

    fn dev_client(transport: &MockTransport) -> RunHistoryClient {
        let fixtures = HashMap::from([(
            "Compose".to_string(),
            ActionFixture {
                inputs: Some(json!("hello")),
                outputs: Some(json!({ "body": { "ok": true } })),
            },
        )]);
        RunHistoryClient::new(options(transport).with_dev_mode(true).with_fixtures(fixtures))
            .unwrap()
    }

    fn run(name: &str) -> Value {
        json!({ "id": format!("/workflows/orders/runs/{name}"), "name": name })
    }

    #[test]
    fn construction_requires_base_url_and_api_version() {
        for is_dev in [false, true] {
            let missing_base = RunServiceOptions::new("", "2018-11-01").with_dev_mode(is_dev);
            assert!(matches!(
                RunHistoryClient::new(missing_base),
                Err(Error::Config(ref msg)) if msg.contains("base url")
            ));

            let missing_version = RunServiceOptions::new(BASE, "  ").with_dev_mode(is_dev);
            assert!(matches!(
                RunHistoryClient::new(missing_version),
                Err(Error::Config(ref msg)) if msg.contains("api version")
            ));

            let ok = RunServiceOptions::new(BASE, "2018-11-01").with_dev_mode(is_dev);
            let client = RunHistoryClient::new(ok).unwrap();
            assert_eq!(client.is_dev(), is_dev);
        }
    }

    #[test]
    fn construction_rejects_unparseable_base_url() {
        let err = RunHistoryClient::new(RunServiceOptions::new("not a url", "v1")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn debug_output_redacts_token() {
        let opts = RunServiceOptions::new(BASE, "v1").with_access_token("secret-token");
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn get_run_requests_expanded_run_with_raw_token() {
        let transport = MockTransport::new().with_response(run("08585"));
        let got = client(&transport).get_run("08585").await.unwrap();
        assert_eq!(got.name, "08585");

        let recorded = &transport.requests()[0];
        assert_eq!(recorded.verb, HttpVerb::Get);
        assert_eq!(
            recorded.request.uri,
            format!(
                "{BASE}/workflows/orders/runs/08585?api-version=2018-11-01&$expand=properties%2Factions%2Cworkflow%2Fproperties"
            )
        );
        assert_eq!(recorded.request.headers.get("Authorization"), Some("token-1"));
    }

    #[tokio::test]
    async fn requests_omit_authorization_without_token() {
        let transport = MockTransport::new().with_response(json!({ "value": [] }));
        let opts = RunServiceOptions::new(BASE, "v1")
            .with_workflow("orders")
            .with_http_client(Arc::new(transport.clone()));
        RunHistoryClient::new(opts).unwrap().get_runs().await.unwrap();
        assert_eq!(transport.requests()[0].request.headers.get("Authorization"), None);
    }

    #[tokio::test]
    async fn pagination_follows_next_link_verbatim_and_preserves_order() {
        let next_1 = format!("{BASE}/workflows/orders/runs?api-version=2018-11-01&$skiptoken=abc");
        let next_2 = format!("{BASE}/workflows/orders/runs?api-version=2018-11-01&$skiptoken=def");
        let transport = MockTransport::new()
            .with_response(json!({ "value": [run("r1"), run("r2")], "nextLink": next_1 }))
            .with_response(json!({ "value": [run("r3")], "nextLink": next_2 }))
            .with_response(json!({ "value": [run("r4")] }));
        let client = client(&transport);

        let runs = client.list_all_runs().await.unwrap();
        let names: Vec<&str> = runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2", "r3", "r4"]);

        let uris: Vec<String> = transport
            .requests()
            .into_iter()
            .map(|r| r.request.uri)
            .collect();
        assert_eq!(uris.len(), 3);
        assert!(uris[0].ends_with("/workflows/orders/runs?api-version=2018-11-01"));
        assert_eq!(uris[1], next_1);
        assert_eq!(uris[2], next_2);
    }

    #[tokio::test]
    async fn run_pages_stops_after_an_error() {
        let transport = MockTransport::new()
            .with_response(json!({ "value": [run("r1")], "nextLink": "https://host/next" }))
            .with_error(TransportError::http(500, Some("boom".into())));
        let pages: Vec<Result<Runs>> = client(&transport).run_pages().collect().await;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert_eq!(pages[1].as_ref().unwrap_err().status(), Some(500));
    }

    #[tokio::test]
    async fn get_more_runs_rejects_empty_token() {
        let transport = MockTransport::new();
        let err = client(&transport).get_more_runs(" ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn dev_mode_scope_repetitions_are_empty_without_io() {
        let transport = MockTransport::new();
        let client = dev_client(&transport);
        for (node, run_id, status) in [
            ("Scope", "/workflows/orders/runs/1", None),
            ("", "", Some("Succeeded")),
            ("For_each", "/workflows/orders/runs/2", Some("Failed")),
        ] {
            let list = client
                .get_scope_repetitions(&ActionRef::new(node, run_id), status)
                .await
                .unwrap();
            assert!(list.value.is_empty());
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn scope_repetitions_filter_only_when_status_given() {
        let transport = MockTransport::new()
            .with_response(json!({ "value": [{ "name": "000000", "properties": { "status": "Succeeded", "repetitionIndexes": [{ "scopeName": "For_each", "itemIndex": 0 }] } }] }))
            .with_response(json!({ "value": [] }));
        let client = client(&transport);
        let action = ActionRef::new("For_each", "/workflows/orders/runs/08585");

        let list = client
            .get_scope_repetitions(&action, Some("Succeeded"))
            .await
            .unwrap();
        assert_eq!(list.value[0].properties.repetition_indexes[0].item_index, 0);
        client.get_scope_repetitions(&action, None).await.unwrap();

        let requests = transport.requests();
        let unfiltered = &requests[1].request.uri;
        assert_eq!(
            unfiltered,
            &format!("{BASE}/workflows/orders/runs/08585/actions/For_each/scopeRepetitions?api-version=2018-11-01")
        );
        assert_eq!(
            requests[0].request.uri,
            format!("{unfiltered}&$filter=status%20eq%20%27Succeeded%27")
        );
    }

    #[tokio::test]
    async fn get_repetition_targets_single_repetition() {
        let transport = MockTransport::new().with_response(json!({ "name": "000001" }));
        let action = ActionRef::new("For_each", "/workflows/orders/runs/08585");
        let rep = client(&transport)
            .get_repetition(&action, "000001")
            .await
            .unwrap();
        assert_eq!(rep.name, "000001");
        assert_eq!(
            transport.requests()[0].request.uri,
            format!("{BASE}/workflows/orders/runs/08585/actions/For_each/repetitions/000001?api-version=2018-11-01")
        );
    }

    #[tokio::test]
    async fn dev_mode_action_links_use_fixtures_without_io() {
        let transport = MockTransport::new();
        let client = dev_client(&transport);
        let links = ActionLinks {
            inputs_link: Some(ContentLink::new("https://blob/in")),
            outputs_link: Some(ContentLink::new("https://blob/out")),
        };

        let payloads = client.get_action_links(&links, "Compose").await.unwrap();
        let inputs = payloads.inputs.unwrap();
        assert_eq!(inputs["Inputs"].value, ParameterValue::Text("hello".into()));
        let outputs = payloads.outputs.unwrap();
        assert_eq!(outputs["body"].display_name, "body");

        let empty = client
            .get_action_links(&ActionLinks::default(), "Unknown")
            .await
            .unwrap();
        assert_eq!(empty, ActionPayloads::default());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn action_links_are_fetched_and_normalized() {
        let transport = MockTransport::new()
            .with_response(json!({ "statusCode": 200 }))
            .with_response(json!("raw input"));
        let links = ActionLinks {
            inputs_link: Some(ContentLink::new("https://blob/in")),
            outputs_link: Some(ContentLink::new("https://blob/out")),
        };

        let payloads = client(&transport)
            .get_action_links(&links, "Compose")
            .await
            .unwrap();
        assert_eq!(
            payloads.outputs.unwrap()["statusCode"].value,
            ParameterValue::Json(json!(200))
        );
        assert_eq!(
            payloads.inputs.unwrap()["Inputs"].value.as_str(),
            Some("raw input")
        );
    }

    #[tokio::test]
    async fn get_content_without_uri_fails_before_io() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .get_content(&ContentLink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref v) if v.field.as_deref() == Some("uri")));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn run_trigger_without_uri_fails_before_io() {
        let transport = MockTransport::new();
        let client = client(&transport);
        for callback in [
            CallbackInfo::default(),
            CallbackInfo {
                method: Some("POST".into()),
                relative_path: Some("/run".into()),
                ..Default::default()
            },
        ] {
            let err = client.run_trigger(&callback).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn run_trigger_uses_descriptor_method_or_post() {
        let transport = MockTransport::new()
            .with_response(Value::Null)
            .with_response(json!({ "accepted": true }));
        let client = client(&transport);

        client
            .run_trigger(&CallbackInfo::url("https://host/trigger?sig=1"))
            .await
            .unwrap();
        let body = client
            .run_trigger(&CallbackInfo::relative(
                "get",
                "https://host/api",
                "/triggers/manual/run",
            ))
            .await
            .unwrap();
        assert_eq!(body, json!({ "accepted": true }));

        let requests = transport.requests();
        assert_eq!(requests[0].verb, HttpVerb::Post);
        assert_eq!(requests[0].request.uri, "https://host/trigger?sig=1");
        assert_eq!(requests[1].verb, HttpVerb::Get);
        assert_eq!(requests[1].request.uri, "https://host/api/triggers/manual/run");
    }

    #[tokio::test]
    async fn run_trigger_posts_to_value_when_descriptor_also_names_a_method() {
        let transport = MockTransport::new()
            .with_response(Value::Null)
            .with_response(Value::Null);
        let client = client(&transport);

        let with_method: CallbackInfo = serde_json::from_value(json!({
            "value": "https://host/api/workflows/orders/triggers/manual/invoke?sig=abc",
            "method": "POST"
        }))
        .unwrap();
        client.run_trigger(&with_method).await.unwrap();

        let with_base_path: CallbackInfo = serde_json::from_value(json!({
            "value": "https://host/invoke?sig=def",
            "method": "GET",
            "basePath": "https://host/api/workflows/orders/triggers/manual/invoke",
            "queries": { "api-version": "2016-10-01" }
        }))
        .unwrap();
        client.run_trigger(&with_base_path).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].verb, HttpVerb::Post);
        assert_eq!(
            requests[0].request.uri,
            "https://host/api/workflows/orders/triggers/manual/invoke?sig=abc"
        );
        assert_eq!(requests[1].verb, HttpVerb::Post);
        assert_eq!(requests[1].request.uri, "https://host/invoke?sig=def");
    }

    #[tokio::test]
    async fn run_trigger_rejects_unsupported_method() {
        let transport = MockTransport::new();
        let callback = CallbackInfo::relative("DELETE", "https://host/api", "/run");
        let err = client(&transport).run_trigger(&callback).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { ref method } if method == "delete"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn run_trigger_failure_keeps_status_and_both_messages() {
        let mut failure = TransportError::http(400, Some("trigger input invalid".into()));
        failure.message = "Bad Request".into();
        let transport = MockTransport::new().with_error(failure);

        let err = client(&transport)
            .run_trigger(&CallbackInfo::url("https://host/trigger"))
            .await
            .unwrap_err();
        match err {
            Error::RunService(err) => {
                assert_eq!(err.operation, "run_trigger");
                assert_eq!(err.status, Some(400));
                assert_eq!(err.message, "Bad Request");
                assert_eq!(err.server_message.as_deref(), Some("trigger input invalid"));
            }
            other => panic!("expected run service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_failures_keep_structured_fields() {
        let mut failure = TransportError::http(404, Some("run not found".into()));
        failure.code = Some("WorkflowRunNotFound".into());
        let transport = MockTransport::new().with_error(failure);

        let err = client(&transport).get_run("missing").await.unwrap_err();
        match err {
            Error::RunService(err) => {
                assert_eq!(err.operation, "get_run");
                assert_eq!(err.kind, TransportErrorKind::Http);
                assert_eq!(err.status, Some(404));
                assert_eq!(err.code.as_deref(), Some("WorkflowRunNotFound"));
                assert_eq!(err.server_message.as_deref(), Some("run not found"));
            }
            other => panic!("expected run service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_run_body_is_a_serialization_error() {
        let transport = MockTransport::new().with_response(json!({ "value": "not a list" }));
        let err = client(&transport).get_runs().await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    struct HangingTransport;

    impl HttpTransport for HangingTransport {
        fn get(&self, _request: HttpRequest) -> BoxFuture<'_, TransportResult> {
            Box::pin(std::future::pending())
        }

        fn post(&self, _request: HttpRequest) -> BoxFuture<'_, TransportResult> {
            Box::pin(std::future::pending())
        }

        fn put(&self, _request: HttpRequest) -> BoxFuture<'_, TransportResult> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn hung_transport_times_out() {
        let opts = RunServiceOptions::new(BASE, "v1")
            .with_workflow("orders")
            .with_http_client(Arc::new(HangingTransport))
            .with_timeout(Some(Duration::from_millis(20)));
        let err = RunHistoryClient::new(opts)
            .unwrap()
            .get_runs()
            .await
            .unwrap_err();
        match err {
            Error::RunService(err) => {
                assert_eq!(err.kind, TransportErrorKind::Timeout);
                assert_eq!(err.operation, "get_runs");
                assert_eq!(err.status, None);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_source_overrides_dev_flag() {
        let transport = MockTransport::new();
        let client = RunHistoryClient::with_source(
            options(&transport),
            Arc::new(FixtureRunSource::default()),
        )
        .unwrap();
        assert!(client.is_dev());
        let list = client
            .get_scope_repetitions(&ActionRef::new("Scope", "/workflows/orders/runs/1"), None)
            .await
            .unwrap();
        assert!(list.value.is_empty());
        assert!(transport.requests().is_empty());
    }
}
