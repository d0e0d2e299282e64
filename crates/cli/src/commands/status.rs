//! Agent health and readiness

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthReport, Readiness};
use crate::output::{color_status, print_json, print_warning, OutputFormat};

/// Row for the component table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct StatusReport {
    health: HealthReport,
    readiness: Readiness,
}

/// Show agent health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthReport) = client.probe("healthz").await?;
    let (_, readiness): (_, Readiness) = client.probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&StatusReport { health, readiness })?,
        OutputFormat::Table => {
            println!("{}", "Agent Status".bold());
            println!("{}", "=".repeat(50));
            println!("Health:                 {}", color_status(&health.status));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness:              {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                println!("Reason:                 {}", reason.dimmed());
            }
            println!();

            if health.components.is_empty() {
                print_warning("Agent reports no components");
                return Ok(());
            }

            let now = Utc::now();
            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    last_check: format_age(component.last_check, now),
                    message: component.message.clone().unwrap_or_default(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Render how long ago `at` was, relative to `now`
fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    }
}
