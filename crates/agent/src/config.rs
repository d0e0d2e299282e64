//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `USAGE_AGENT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Namespace whose workloads are ranked
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Base URL of the Prometheus (or Thanos querier) server
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// API server port for health/metrics/ranking
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between refreshes; 0 refreshes once at startup
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Timeout for a single Prometheus query in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// JSON file listing the workloads to rank
    #[serde(default)]
    pub workloads_file: Option<PathBuf>,
}

fn default_namespace() -> String {
    std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

fn default_prometheus_url() -> String {
    "http://prometheus-operated:9090".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            prometheus_url: default_prometheus_url(),
            api_port: default_api_port(),
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_request_timeout(),
            workloads_file: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("USAGE_AGENT").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
