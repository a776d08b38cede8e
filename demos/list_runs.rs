//! Lists every run of a workflow, then prints the inputs and outputs of each
//! action in the most recent run.
//!
//! Run with:
//! ```bash
//! RUN_HISTORY_BASE_URL=https://management.example.com/api \
//! RUN_HISTORY_API_VERSION=2018-11-01 \
//! RUN_HISTORY_WORKFLOW=orders \
//! RUN_HISTORY_TOKEN="Bearer ..." \
//! cargo run --example list_runs
//! ```

use std::error::Error;

use run_history::{RunHistoryClient, RunServiceOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::var("RUN_HISTORY_BASE_URL")
        .expect("RUN_HISTORY_BASE_URL environment variable must be set");
    let api_version =
        std::env::var("RUN_HISTORY_API_VERSION").unwrap_or_else(|_| "2018-11-01".to_string());
    let workflow = std::env::var("RUN_HISTORY_WORKFLOW")
        .expect("RUN_HISTORY_WORKFLOW environment variable must be set");

    let mut options = RunServiceOptions::new(base_url, api_version).with_workflow(workflow);
    if let Ok(token) = std::env::var("RUN_HISTORY_TOKEN") {
        options = options.with_access_token(token);
    }
    let client = RunHistoryClient::new(options)?;

    let runs = client.list_all_runs().await?;
    println!("{} runs", runs.len());
    for run in &runs {
        println!("  {} {:?}", run.name, run.properties.status);
    }

    let Some(latest) = runs.first() else {
        return Ok(());
    };
    let run = client.get_run(&latest.name).await?;
    for (name, action) in run.properties.actions.iter().flatten() {
        let payloads = client.get_action_links(&action.links(), name).await?;
        println!("{name}:");
        println!("  inputs:  {}", serde_json::to_string(&payloads.inputs)?);
        println!("  outputs: {}", serde_json::to_string(&payloads.outputs)?);
    }
    Ok(())
}
