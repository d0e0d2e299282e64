//! Metric fetch collaborators
//!
//! The coordinator only needs "run this query, give me the response";
//! [`PrometheusFetcher`] does that against the Prometheus HTTP API.

use crate::error::{FetchError, FetchResult};
use crate::query::QueryResponse;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default request timeout for instant queries
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs an instant query against a metrics backend
#[async_trait]
pub trait MetricFetcher: Send + Sync {
    async fn query(&self, query: &str) -> FetchResult<QueryResponse>;
}

/// Fetcher for the Prometheus `/api/v1/query` endpoint
pub struct PrometheusFetcher {
    client: Client,
    query_url: Url,
}

impl PrometheusFetcher {
    /// Create a fetcher for the Prometheus server at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        // Url::join would drop the last path segment of a base without a trailing slash
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query_url = base.join("api/v1/query")?;

        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }
}

#[async_trait]
impl MetricFetcher for PrometheusFetcher {
    async fn query(&self, query: &str) -> FetchResult<QueryResponse> {
        debug!(url = %self.query_url, "Running instant query");

        let response = self
            .client
            .get(self.query_url.clone())
            .query(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Prometheus reports query errors as JSON with a 4xx/5xx status
        let decoded = serde_json::from_str::<QueryResponse>(&body);
        match decoded {
            Ok(parsed) if parsed.status == "error" => Err(FetchError::Query {
                error_type: parsed.error_type.unwrap_or_default(),
                message: parsed.error.unwrap_or_default(),
            }),
            _ if !status.is_success() => Err(FetchError::Status {
                status: status.as_u16(),
                body,
            }),
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(FetchError::Decode(e)),
        }
    }
}
