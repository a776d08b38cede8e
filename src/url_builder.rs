//! URL construction for run-history endpoints.
//!
//! Path segments and query values are percent-encoded here and nowhere else.
//! Query keys are compile-time constants (`api-version`, `$filter`, ...) and are
//! written as-is.

use crate::{
    errors::{Error, Result, ValidationError},
    types::ActionRef,
};

const EXPAND_RUN: &str = "properties/actions,workflow/properties";

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
    path: String,
    query: Vec<(&'static str, String)>,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            path: String::new(),
            query: Vec::new(),
        }
    }

    /// Append one encoded path segment (`/` inside `segment` is escaped).
    pub fn segment(mut self, segment: &str) -> Self {
        self.path.push('/');
        self.path.push_str(&urlencoding::encode(segment));
        self
    }

    /// Append a resource path such as `/workflows/wf/runs/r1`, encoding each
    /// segment but keeping the separators.
    pub fn resource_path(mut self, path: &str) -> Self {
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self = self.segment(segment);
        }
        self
    }

    pub fn query(mut self, key: &'static str, value: impl AsRef<str>) -> Self {
        self.query.push((key, value.as_ref().to_string()));
        self
    }

    pub fn query_opt(self, key: &'static str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        let mut url = format!("{}{}", self.base, self.path);
        for (idx, (key, value)) in self.query.iter().enumerate() {
            url.push(if idx == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}

/// Endpoint templates bound to one base URL, API version and workflow.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub(crate) base_url: String,
    pub(crate) api_version: String,
    pub(crate) workflow_name: String,
}

impl Endpoints {
    fn workflow_runs(&self) -> UrlBuilder {
        UrlBuilder::new(&self.base_url)
            .segment("workflows")
            .segment(&self.workflow_name)
            .segment("runs")
    }

    pub(crate) fn run(&self, run_id: &str) -> Result<String> {
        let run_id = required(run_id, "run_id")?;
        Ok(self
            .workflow_runs()
            .segment(run_id)
            .query("api-version", &self.api_version)
            .query("$expand", EXPAND_RUN)
            .build())
    }

    pub(crate) fn runs(&self) -> String {
        self.workflow_runs()
            .query("api-version", &self.api_version)
            .build()
    }

    pub(crate) fn scope_repetitions(&self, action: &ActionRef, status: Option<&str>) -> Result<String> {
        let run_id = required(&action.run_id, "run_id")?;
        let node_id = required(&action.node_id, "node_id")?;
        let status = status.map(str::trim).filter(|s| !s.is_empty());
        Ok(UrlBuilder::new(&self.base_url)
            .resource_path(run_id)
            .segment("actions")
            .segment(node_id)
            .segment("scopeRepetitions")
            .query("api-version", &self.api_version)
            .query_opt("$filter", status.map(|s| format!("status eq '{s}'")))
            .build())
    }

    pub(crate) fn repetition(&self, action: &ActionRef, repetition_id: &str) -> Result<String> {
        let run_id = required(&action.run_id, "run_id")?;
        let node_id = required(&action.node_id, "node_id")?;
        let repetition_id = required(repetition_id, "repetition_id")?;
        Ok(UrlBuilder::new(&self.base_url)
            .resource_path(run_id)
            .segment("actions")
            .segment(node_id)
            .segment("repetitions")
            .segment(repetition_id)
            .query("api-version", &self.api_version)
            .build())
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            ValidationError::new(format!("{field} is required")).with_field(field),
        ));
    }
    Ok(trimmed)
}
