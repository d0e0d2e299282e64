//! Top consuming workloads

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, RankedUsage, TopWorkloads};
use crate::output::{
    format_bytes, format_cores, format_share, print_json, print_warning, OutputFormat,
};

/// Usage dimension selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DimensionArg {
    /// CPU cores used
    Cpu,
    /// Memory bytes used
    Memory,
}

impl DimensionArg {
    fn title(self) -> &'static str {
        match self {
            DimensionArg::Cpu => "CPU Cores Used",
            DimensionArg::Memory => "Memory Used",
        }
    }

    fn format_value(self, value: f64) -> String {
        match self {
            DimensionArg::Cpu => format_cores(value),
            DimensionArg::Memory => format_bytes(value),
        }
    }

    fn select(self, top: &TopWorkloads) -> &RankedUsage {
        match self {
            DimensionArg::Cpu => &top.cpu_cores_used,
            DimensionArg::Memory => &top.memory_bytes_used,
        }
    }
}

/// Row for the ranking table
#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "#")]
    rank: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Share")]
    share: String,
}

fn rows(dimension: DimensionArg, ranking: &RankedUsage) -> Vec<RankRow> {
    ranking
        .top_workloads
        .iter()
        .enumerate()
        .map(|(i, entry)| RankRow {
            rank: if entry.is_other {
                "-".to_string()
            } else {
                (i + 1).to_string()
            },
            workload: if entry.is_other {
                entry.workload.dimmed().to_string()
            } else {
                entry.workload.clone()
            },
            usage: dimension.format_value(entry.usage),
            share: format_share(entry.usage, ranking.total_usage),
        })
        .collect()
}

/// Show the top consuming workloads per dimension
pub async fn show_top(
    client: &ApiClient,
    dimension: Option<DimensionArg>,
    format: OutputFormat,
) -> Result<()> {
    let top: TopWorkloads = client.get("api/v1/top-workloads").await?;

    if format == OutputFormat::Json {
        return match dimension {
            Some(d) => print_json(d.select(&top)),
            None => print_json(&top),
        };
    }

    if let Some(error) = &top.error {
        print_warning(&format!("Latest usage query failed: {}", error));
    }
    if !top.loaded {
        print_warning("Usage data is still loading; rankings may be incomplete");
    }

    let dimensions = match dimension {
        Some(d) => vec![d],
        None => vec![DimensionArg::Cpu, DimensionArg::Memory],
    };

    for d in dimensions {
        let ranking = d.select(&top);
        println!();
        println!("{}", d.title().bold());
        println!("{}", "=".repeat(50));

        if ranking.top_workloads.is_empty() {
            println!("{}", "No usage reported".yellow());
            continue;
        }

        let table = tabled::Table::new(rows(d, ranking))
            .with(tabled::settings::Style::rounded())
            .to_string();
        println!("{}", table);
        println!("Total: {}", d.format_value(ranking.total_usage).bold());
    }

    Ok(())
}
