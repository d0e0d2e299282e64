//! Workload Usage Ranking CLI
//!
//! A command-line tool for viewing the top resource consuming workloads
//! and checking the usage agent that computes them.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::top::DimensionArg;

/// Workload Usage Ranking CLI
#[derive(Parser)]
#[command(name = "wur")]
#[command(author, version, about = "CLI for Workload Usage Ranking", long_about = None)]
pub struct Cli {
    /// Usage agent URL (can also be set via WUR_API_URL env var)
    #[arg(long, env = "WUR_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the config file setting, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the top resource consuming workloads
    Top {
        /// Only show one dimension
        #[arg(long, short)]
        dimension: Option<DimensionArg>,
    },

    /// Show the current usage of every workload
    Usage,

    /// Ask the agent to re-query usage now
    Refresh,

    /// Show agent health and readiness
    Status,

    /// View or edit the CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the stored configuration
    Show,

    /// Update the stored configuration
    Set {
        /// Usage agent URL
        #[arg(long)]
        url: Option<String>,

        /// Default output format
        #[arg(long)]
        default_format: Option<output::OutputFormat>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;
    let format = config.resolve_format(cli.format);

    let api_url = config.resolve_api_url(cli.api_url);
    let connect = || client::ApiClient::new(&api_url);

    match cli.command {
        Commands::Top { dimension } => {
            commands::top::show_top(&connect()?, dimension, format).await?
        }
        Commands::Usage => commands::usage::show_usage(&connect()?, format).await?,
        Commands::Refresh => commands::refresh::trigger_refresh(&connect()?, format).await?,
        Commands::Status => commands::status::show_status(&connect()?, format).await?,
        Commands::Config(ConfigCommands::Show) => commands::config::show_config(format)?,
        Commands::Config(ConfigCommands::Set {
            url,
            default_format,
        }) => commands::config::set_config(url, default_format)?,
    }

    Ok(())
}
