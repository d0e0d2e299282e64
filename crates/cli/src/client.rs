//! API client for communicating with the usage agent

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the usage agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.get_with_status(path).await?;
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        serde_json::from_str(&body).context("Failed to parse response")
    }

    /// Make a GET request to a probe endpoint
    ///
    /// Probes answer 503 with a regular body, so the body is parsed for
    /// either status.
    pub async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let (status, body) = self.get_with_status(path).await?;
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        let parsed = serde_json::from_str(&body).context("Failed to parse response")?;
        Ok((status, parsed))
    }

    /// Make a POST request without a body
    pub async fn post_empty(&self, path: &str) -> Result<StatusCode> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        Ok(status)
    }

    async fn get_with_status(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;
        Ok((status, body))
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub workload: String,
    #[serde(default)]
    pub is_other: bool,
    pub usage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankedUsage {
    pub total_usage: f64,
    pub top_workloads: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopWorkloads {
    pub loaded: bool,
    pub error: Option<String>,
    pub cpu_cores_used: RankedUsage,
    pub memory_bytes_used: RankedUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadUsage {
    pub name: String,
    pub namespace: Option<String>,
    pub owner: Option<Owner>,
    pub cpu_cores_used: Option<f64>,
    pub memory_bytes_used: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageList {
    pub loaded: bool,
    pub error: Option<String>,
    pub workloads: Vec<WorkloadUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
