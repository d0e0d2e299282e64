//! Trigger a usage refresh on the agent

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{print_json, print_success, OutputFormat};

pub async fn trigger_refresh(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.post_empty("api/v1/refresh").await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "status": status.as_u16() }))?,
        OutputFormat::Table => {
            print_success("Refresh triggered; results land as each query completes")
        }
    }

    Ok(())
}
