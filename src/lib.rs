//! Async client for a workflow engine's run-history REST API.
//!
//! [`RunHistoryClient`] lists runs (following server-issued `nextLink`
//! continuations), fetches a single run, the repetitions of looped or scoped
//! actions, and the externally stored input/output payloads of an action,
//! normalizing those payloads into [`BoundParameters`]. It can also invoke a
//! workflow trigger through its [`CallbackInfo`] descriptor.
//!
//! In dev mode the client serves repetitions and action payloads from
//! fixtures instead of the network.
//!
//! ```no_run
//! # async fn demo() -> run_history::Result<()> {
//! use run_history::{RunHistoryClient, RunServiceOptions};
//!
//! let client = RunHistoryClient::new(
//!     RunServiceOptions::new("https://management.example.com/api", "2018-11-01")
//!         .with_workflow("orders")
//!         .with_access_token("Bearer ..."),
//! )?;
//! for run in client.list_all_runs().await? {
//!     println!("{} {:?}", run.name, run.properties.status);
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::result_large_err)]

use std::time::Duration;

/// Default value of the `X-Run-History-Client` header.
pub const DEFAULT_CLIENT_HEADER: &str = concat!("run-history-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-call timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Response headers checked, in order, for a server request id.
pub(crate) const REQUEST_ID_HEADERS: [&str; 3] = [
    "x-ms-request-id",
    "x-ms-correlation-request-id",
    "x-request-id",
];

mod client;
mod errors;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod parameters;
mod source;
mod telemetry;
pub mod testing;
mod transport;
mod types;
mod url_builder;

pub use client::{RunHistoryClient, RunServiceOptions};
pub use errors::{
    Error, Result, RunServiceError, TransportError, TransportErrorKind, ValidationError,
};
pub use http::{HeaderEntry, HeaderList};
#[cfg(feature = "mock")]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub use mock::{MockTransport, RecordedRequest};
pub use parameters::{
    parse_action_link, BoundParameter, BoundParameters, ParameterValue, INPUTS_KEY, OUTPUTS_KEY,
};
pub use source::{FixtureRunSource, HttpRunSource, RunSource};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext};
pub use transport::{
    send_by_method, BoxFuture, HttpRequest, HttpTransport, HttpVerb, ReqwestTransport,
    ReqwestTransportBuilder, TransportResult,
};
pub use types::{
    ActionFixture, ActionFixtures, ActionLinks, ActionPayloads, ActionRef, CallbackInfo,
    ContentLink, Correlation, RawActionPayloads, RepetitionIndex, RepetitionList,
    RepetitionProperties, Run, RunAction, RunError, RunProperties, RunRepetition, RunStatus,
    Runs,
};
pub use url_builder::UrlBuilder;
