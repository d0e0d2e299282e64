//! View and edit the CLI configuration file

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Show the stored configuration
pub fn show_config(format: OutputFormat) -> Result<()> {
    let path = Config::config_path()?;
    let config = Config::load_from(&path)?;

    match format {
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Table => {
            println!("{}", "Configuration".bold());
            println!("{}", "=".repeat(50));
            println!("File:                   {}", path.display());
            println!(
                "API URL:                {}",
                config.api_url.as_deref().unwrap_or("(default)")
            );
            println!(
                "Default format:         {}",
                config
                    .default_format
                    .map(|f| format!("{:?}", f).to_lowercase())
                    .unwrap_or_else(|| "(default)".to_string())
            );
        }
    }

    Ok(())
}

/// Update the stored configuration
pub fn set_config(api_url: Option<String>, default_format: Option<OutputFormat>) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config::load_from(&path)?;

    if api_url.is_none() && default_format.is_none() {
        print_info("Nothing to change; pass --url or --default-format");
        return Ok(());
    }

    if api_url.is_some() {
        config.api_url = api_url;
    }
    if default_format.is_some() {
        config.default_format = default_format;
    }

    config.save_to(&path)?;
    print_success(&format!("Saved configuration to {}", path.display()));
    Ok(())
}
