//! Where repetition and action payload data come from.
//!
//! The client picks one [`RunSource`] at construction: [`HttpRunSource`] talks
//! to the run-history API, [`FixtureRunSource`] serves canned payloads for
//! dev mode without any network I/O.

use serde_json::Value;

use crate::{
    errors::{Error, Result, ValidationError},
    transport::{BoxFuture, Gateway, HttpRequest},
    types::{
        ActionFixture, ActionFixtures, ActionLinks, ActionRef, ContentLink, RawActionPayloads,
        RepetitionList,
    },
    url_builder::Endpoints,
};

pub trait RunSource: Send + Sync {
    /// Repetitions of a scoped action, optionally filtered by status.
    fn scope_repetitions<'a>(
        &'a self,
        action: &'a ActionRef,
        status: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RepetitionList>>;

    /// Raw input/output payloads of an action.
    fn action_payloads<'a>(
        &'a self,
        links: &'a ActionLinks,
        node_id: &'a str,
    ) -> BoxFuture<'a, Result<RawActionPayloads>>;

    /// Whether this source serves fixture data.
    fn is_fixture(&self) -> bool {
        false
    }
}

/// Fetch externally stored content behind a link, without auth.
pub(crate) async fn fetch_content(gateway: &Gateway, link: &ContentLink) -> Result<Value> {
    let uri = link.uri().ok_or_else(|| {
        Error::Validation(ValidationError::new("content link has no uri").with_field("uri"))
    })?;
    let request = HttpRequest::new(uri)
        .with_header("Access-Control-Allow-Origin", "*")
        .without_auth();
    gateway.get("get_content", request).await
}

pub struct HttpRunSource {
    gateway: Gateway,
    endpoints: Endpoints,
}

impl HttpRunSource {
    pub(crate) fn new(gateway: Gateway, endpoints: Endpoints) -> Self {
        Self { gateway, endpoints }
    }

    async fn fetch_repetitions(
        &self,
        action: &ActionRef,
        status: Option<&str>,
    ) -> Result<RepetitionList> {
        let uri = self.endpoints.scope_repetitions(action, status)?;
        self.gateway
            .get_json("get_scope_repetitions", self.gateway.authorized(uri))
            .await
    }

    async fn fetch_payloads(&self, links: &ActionLinks) -> Result<RawActionPayloads> {
        let mut payloads = RawActionPayloads::default();
        // Outputs before inputs, one at a time.
        if let Some(link) = links.outputs_link.as_ref().filter(|l| l.uri().is_some()) {
            payloads.outputs = Some(fetch_content(&self.gateway, link).await?);
        }
        if let Some(link) = links.inputs_link.as_ref().filter(|l| l.uri().is_some()) {
            payloads.inputs = Some(fetch_content(&self.gateway, link).await?);
        }
        Ok(payloads)
    }
}

impl RunSource for HttpRunSource {
    fn scope_repetitions<'a>(
        &'a self,
        action: &'a ActionRef,
        status: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RepetitionList>> {
        Box::pin(self.fetch_repetitions(action, status))
    }

    fn action_payloads<'a>(
        &'a self,
        links: &'a ActionLinks,
        _node_id: &'a str,
    ) -> BoxFuture<'a, Result<RawActionPayloads>> {
        Box::pin(self.fetch_payloads(links))
    }
}

/// Serves fixture payloads keyed by node id and empty repetition lists.
#[derive(Debug, Clone, Default)]
pub struct FixtureRunSource {
    fixtures: ActionFixtures,
}

impl FixtureRunSource {
    pub fn new(fixtures: ActionFixtures) -> Self {
        Self { fixtures }
    }

    /// Load fixtures from a JSON object of `{ nodeId: { "inputs": ..., "outputs": ... } }`.
    pub fn from_json(value: Value) -> Result<Self> {
        let fixtures = serde_json::from_value(value)?;
        Ok(Self::new(fixtures))
    }

    pub fn fixture(&self, node_id: &str) -> Option<&ActionFixture> {
        self.fixtures.get(node_id)
    }
}

impl RunSource for FixtureRunSource {
    fn scope_repetitions<'a>(
        &'a self,
        _action: &'a ActionRef,
        _status: Option<&'a str>,
    ) -> BoxFuture<'a, Result<RepetitionList>> {
        Box::pin(async { Ok::<_, Error>(RepetitionList::default()) })
    }

    fn action_payloads<'a>(
        &'a self,
        _links: &'a ActionLinks,
        node_id: &'a str,
    ) -> BoxFuture<'a, Result<RawActionPayloads>> {
        let payloads = self
            .fixture(node_id)
            .map(|fixture| RawActionPayloads {
                inputs: fixture.inputs.clone(),
                outputs: fixture.outputs.clone(),
            })
            .unwrap_or_default();
        Box::pin(async move { Ok::<_, Error>(payloads) })
    }

    fn is_fixture(&self) -> bool {
        true
    }
}
