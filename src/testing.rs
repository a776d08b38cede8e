//! Helpers for pointing a client at a local mock server.

use std::time::Duration;

use crate::{ActionFixtures, RunHistoryClient, RunServiceOptions};

/// API version used by the helpers.
pub const TEST_API_VERSION: &str = "2018-11-01";
/// Workflow name used by the helpers.
pub const TEST_WORKFLOW: &str = "orders";
/// Access token used by the helpers.
pub const TEST_ACCESS_TOKEN: &str = "Bearer test-token";

/// Options targeting `base_url` with a short timeout and a test token.
pub fn test_options(base_url: &str) -> RunServiceOptions {
    RunServiceOptions::new(base_url, TEST_API_VERSION)
        .with_workflow(TEST_WORKFLOW)
        .with_access_token(TEST_ACCESS_TOKEN)
        .with_timeout(Some(Duration::from_secs(5)))
}

/// Create a test client configured to use a wiremock server.
pub fn test_client(base_url: &str) -> RunHistoryClient {
    RunHistoryClient::new(test_options(base_url)).expect("client")
}

/// Create a dev-mode test client serving the given fixtures.
pub fn test_dev_client(base_url: &str, fixtures: ActionFixtures) -> RunHistoryClient {
    RunHistoryClient::new(
        test_options(base_url)
            .with_dev_mode(true)
            .with_fixtures(fixtures),
    )
    .expect("client")
}
