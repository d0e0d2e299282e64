//! Per-workload usage listing

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, UsageList, WorkloadUsage};
use crate::output::{format_bytes, format_cores, print_json, print_warning, OutputFormat};

/// Row for the usage table
#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Workload")]
    name: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

impl From<&WorkloadUsage> for UsageRow {
    fn from(w: &WorkloadUsage) -> Self {
        Self {
            name: w.name.clone(),
            namespace: w.namespace.clone().unwrap_or_else(|| "-".to_string()),
            owner: w
                .owner
                .as_ref()
                .map(|o| format!("{}/{}", o.kind, o.name))
                .unwrap_or_else(|| "-".to_string()),
            cpu: w.cpu_cores_used.map(format_cores).unwrap_or_else(|| "-".to_string()),
            memory: w
                .memory_bytes_used
                .map(format_bytes)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Show current usage of every workload
pub async fn show_usage(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let usage: UsageList = client.get("api/v1/usage").await?;

    match format {
        OutputFormat::Json => print_json(&usage)?,
        OutputFormat::Table => {
            if let Some(error) = &usage.error {
                print_warning(&format!("Latest usage query failed: {}", error));
            }

            if usage.workloads.is_empty() {
                print_warning("No workloads configured on the agent");
                return Ok(());
            }

            let rows: Vec<UsageRow> = usage.workloads.iter().map(UsageRow::from).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} workloads", usage.workloads.len());
        }
    }

    Ok(())
}
