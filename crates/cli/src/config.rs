//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// CLI configuration, read from `~/.config/wur/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Usage agent URL
    pub api_url: Option<String>,
    /// Default output format
    pub default_format: Option<OutputFormat>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Agent URL, preferring an explicit flag over the file
    pub fn resolve_api_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Output format, preferring an explicit flag over the file
    pub fn resolve_format(&self, flag: Option<OutputFormat>) -> OutputFormat {
        flag.or(self.default_format).unwrap_or_default()
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("wur").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_url: Some("http://usage-agent.ml:8080".to_string()),
            default_format: Some(OutputFormat::Json),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_flag_overrides_file() {
        let config = Config {
            api_url: Some("http://from-file:8080".to_string()),
            default_format: Some(OutputFormat::Json),
        };

        assert_eq!(
            config.resolve_api_url(Some("http://from-flag:8080".to_string())),
            "http://from-flag:8080"
        );
        assert_eq!(config.resolve_api_url(None), "http://from-file:8080");
        assert_eq!(config.resolve_format(Some(OutputFormat::Table)), OutputFormat::Table);
        assert_eq!(config.resolve_format(None), OutputFormat::Json);

        let empty = Config::default();
        assert_eq!(empty.resolve_api_url(None), DEFAULT_API_URL);
        assert_eq!(empty.resolve_format(None), OutputFormat::Table);
    }
}
