//! Transport-facing records for workflow runs, repetitions and content links.
//!
//! Unknown fields are kept in `extra` so records round-trip without loss.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::parameters::BoundParameters;

/// Run and action status values.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Waiting,
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
    Suspended,
    TimedOut,
    Aborted,
    Ignored,
    Paused,
    /// Unknown status for forward compatibility.
    #[serde(other)]
    Unknown,
}

/// Indirection to externally stored input/output payload content.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<Value>,
}

impl ContentLink {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// The link URI, if present and non-blank.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Correlation data attached to runs and actions.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_keywords: Option<Vec<String>>,
}

/// Error payload recorded on a failed run, action or repetition.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RunError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Trigger or action record inside a run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_link: Option<ContentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_link: Option<ContentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Correlation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunAction {
    pub fn links(&self) -> ActionLinks {
        ActionLinks {
            inputs_link: self.inputs_link.clone(),
            outputs_link: self.outputs_link.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Correlation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<RunAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<HashMap<String, RunAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One execution instance of a workflow.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Run {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: RunProperties,
}

/// A page of runs. `next_link`, when present, is the exact URI of the next page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Runs {
    pub next_link: Option<String>,
    pub runs: Vec<Run>,
}

/// Generic paged-resource envelope returned by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PagedResources<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "nextLink")]
    pub next_link: Option<String>,
}

impl From<PagedResources<Run>> for Runs {
    fn from(page: PagedResources<Run>) -> Self {
        Self {
            next_link: page.next_link.filter(|link| !link.trim().is_empty()),
            runs: page.value,
        }
    }
}

/// Position of a repetition inside a looped or scoped action.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<String>,
    pub item_index: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repetition_indexes: Vec<RepetitionIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_link: Option<ContentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_link: Option<ContentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Correlation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One iteration record of a looped or scoped action within a run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RunRepetition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: RepetitionProperties,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RepetitionList {
    #[serde(default)]
    pub value: Vec<RunRepetition>,
}

/// Addresses an action inside a run.
///
/// `run_id` is the run's resource path (e.g. `/workflows/orders/runs/0858...`);
/// repetition endpoints append it directly to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub node_id: String,
    pub run_id: String,
}

impl ActionRef {
    pub fn new(node_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            run_id: run_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_link: Option<ContentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_link: Option<ContentLink>,
}

/// Raw payloads before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawActionPayloads {
    pub inputs: Option<Value>,
    pub outputs: Option<Value>,
}

/// Normalized inputs/outputs of an action.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ActionPayloads {
    pub inputs: Option<BoundParameters>,
    pub outputs: Option<BoundParameters>,
}

/// Fixture payloads keyed by node id, served in dev mode.
pub type ActionFixtures = HashMap<String, ActionFixture>;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ActionFixture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
}

/// Descriptor used to invoke a workflow's trigger endpoint.
///
/// Servers return either a plain callback URL in `value` or a relative-path
/// form (`method`, `basePath`, `relativePath`, `queries`), often alongside
/// each other. The relative-path form wins only when it carries a relative
/// path and a base path; otherwise `value` is used with `POST`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallbackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<BTreeMap<String, String>>,
}

impl CallbackInfo {
    pub fn url(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn relative(
        method: impl Into<String>,
        base_path: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            method: Some(method.into()),
            base_path: Some(base_path.into()),
            relative_path: Some(relative_path.into()),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// HTTP method to invoke the callback with.
    pub fn method(&self) -> &str {
        if self.relative_uri().is_none() {
            return "POST";
        }
        non_blank(self.method.as_deref()).unwrap_or("POST")
    }

    /// Target URI, or `None` when the descriptor cannot be resolved.
    pub fn uri(&self) -> Option<String> {
        self.relative_uri()
            .or_else(|| non_blank(self.value.as_deref()).map(str::to_string))
    }

    fn relative_uri(&self) -> Option<String> {
        let path = non_blank(self.relative_path.as_deref())?.trim_start_matches('/');
        let base = non_blank(self.base_path.as_deref())?;
        let mut uri = base.to_string();
        if !path.is_empty() {
            if !uri.ends_with('/') {
                uri.push('/');
            }
            uri.push_str(path);
        }
        if let Some(queries) = self.queries.as_ref().filter(|q| !q.is_empty()) {
            let encoded = queries
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&encoded);
        }
        Some(uri)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
