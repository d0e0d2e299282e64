//! Integration tests for the agent API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use usage_agent::api::{create_router, AppState, TopWorkloadsResponse, UsageResponse};
use usage_lib::query::{QueryResponse, QuerySample};
use usage_lib::{
    register_dimension_components, CoordinatorBuilder, Dimension, FetchError, FetchResult,
    HealthRegistry, MetricFetcher, OwnerKind, UsageCoordinator, UsageMetrics, Workload,
};

const CPU_QUERY: &str = "cpu";
const MEMORY_QUERY: &str = "memory";

type Samples = Vec<(&'static str, &'static str, &'static str)>;

/// Mock fetcher answering each query from a fixed table
struct MockFetcher {
    responses: Mutex<HashMap<&'static str, Result<Samples, String>>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn ok(self, query: &'static str, samples: Samples) -> Self {
        self.responses.lock().unwrap().insert(query, Ok(samples));
        self
    }

    fn err(self, query: &'static str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(query, Err(message.to_string()));
        self
    }
}

#[async_trait]
impl MetricFetcher for MockFetcher {
    async fn query(&self, query: &str) -> FetchResult<QueryResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.responses.lock().unwrap().get(query).cloned();
        match entry {
            Some(Ok(samples)) => Ok(QueryResponse::from_samples(
                samples
                    .into_iter()
                    .map(|(kind, name, value)| QuerySample::new(kind, name, Some(value)))
                    .collect(),
            )),
            Some(Err(message)) => Err(FetchError::Other(message)),
            None => Err(FetchError::Other(format!("unexpected query {query}"))),
        }
    }
}

fn test_workloads() -> Arc<[Workload]> {
    vec![
        Workload::new("ray-a")
            .with_namespace("ml")
            .with_owner("RayCluster", "cluster-a"),
        Workload::new("job-b").with_namespace("ml").with_owner("Job", "b"),
        Workload::new("orphan").with_namespace("ml"),
    ]
    .into()
}

async fn setup_test_app(fetcher: MockFetcher) -> (Router, Arc<AppState>, Arc<MockFetcher>) {
    let fetcher = Arc::new(fetcher);
    let coordinator: Arc<UsageCoordinator> = Arc::new(
        CoordinatorBuilder::new()
            .fetcher(fetcher.clone())
            .query(Dimension::CpuCoresUsed, CPU_QUERY)
            .query(Dimension::MemoryBytesUsed, MEMORY_QUERY)
            .build()
            .unwrap(),
    );

    let health_registry = HealthRegistry::new();
    register_dimension_components(&health_registry).await;

    let state = Arc::new(AppState::new(
        health_registry,
        UsageMetrics::new(),
        coordinator,
        test_workloads(),
    ));
    let router = create_router(state.clone());

    (router, state, fetcher)
}

fn healthy_fetcher() -> MockFetcher {
    MockFetcher::new()
        .ok(
            CPU_QUERY,
            vec![("RayCluster", "cluster-a", "2.5"), ("Job", "b", "4")],
        )
        .ok(MEMORY_QUERY, vec![("RayCluster", "cluster-a", "1024")])
}

/// Refresh and wait until every dimension has either loaded or failed
async fn refresh_and_settle(state: &AppState) {
    let mut receivers = state.coordinator.subscribe();
    state.coordinator.refresh();
    for rx in [&mut receivers.cpu_cores_used, &mut receivers.memory_bytes_used] {
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.loaded || s.error.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_before_first_fetch() {
    let (app, _state, _) = setup_test_app(healthy_fetcher()).await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["cpu_usage"].is_object());
    assert!(health["components"]["memory_usage"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_dimension_never_loaded() {
    let (app, state, _) = setup_test_app(
        MockFetcher::new()
            .ok(CPU_QUERY, vec![])
            .err(MEMORY_QUERY, "connection refused"),
    )
    .await;
    refresh_and_settle(&state).await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["memory_usage"]["message"], "connection refused");
    assert_eq!(health["components"]["cpu_usage"]["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_returns_503_until_loaded() {
    let (app, state, _) = setup_test_app(healthy_fetcher()).await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    refresh_and_settle(&state).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_top_workloads_ranks_loaded_usage() {
    let (app, state, _) = setup_test_app(healthy_fetcher()).await;
    refresh_and_settle(&state).await;

    let (status, body) = get(app, "/api/v1/top-workloads").await;
    assert_eq!(status, StatusCode::OK);

    let top: TopWorkloadsResponse = serde_json::from_slice(&body).unwrap();
    assert!(top.loaded);
    assert!(top.error.is_none());

    let cpu = &top.cpu_cores_used;
    assert_eq!(cpu.total_usage, 6.5);
    let names: Vec<&str> = cpu.top_workloads.iter().map(|e| e.workload.as_str()).collect();
    assert_eq!(names, vec!["job-b", "ray-a"]);

    let memory = &top.memory_bytes_used;
    assert_eq!(memory.total_usage, 1024.0);
    assert_eq!(memory.top_workloads.len(), 1);
    assert_eq!(memory.top_workloads[0].workload, "ray-a");
}

#[tokio::test]
async fn test_top_workloads_ignores_non_finite_samples() {
    let (app, state, _) = setup_test_app(
        MockFetcher::new()
            .ok(
                CPU_QUERY,
                vec![("RayCluster", "cluster-a", "+Inf"), ("Job", "b", "2")],
            )
            .ok(MEMORY_QUERY, vec![("RayCluster", "cluster-a", "NaN")]),
    )
    .await;
    refresh_and_settle(&state).await;

    let (status, body) = get(app, "/api/v1/top-workloads").await;
    assert_eq!(status, StatusCode::OK);

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(raw["cpu_cores_used"]["total_usage"].is_number());
    assert!(raw["memory_bytes_used"]["total_usage"].is_number());

    let top: TopWorkloadsResponse = serde_json::from_slice(&body).unwrap();
    assert!(top.loaded);
    assert_eq!(top.cpu_cores_used.total_usage, 2.0);
    let names: Vec<&str> = top
        .cpu_cores_used
        .top_workloads
        .iter()
        .map(|e| e.workload.as_str())
        .collect();
    assert_eq!(names, vec!["job-b"]);

    assert_eq!(top.memory_bytes_used.total_usage, 0.0);
    assert!(top.memory_bytes_used.top_workloads.is_empty());
}

#[tokio::test]
async fn test_top_workloads_before_load_is_empty() {
    let (app, _state, _) = setup_test_app(healthy_fetcher()).await;

    let (status, body) = get(app, "/api/v1/top-workloads").await;
    assert_eq!(status, StatusCode::OK);

    let top: TopWorkloadsResponse = serde_json::from_slice(&body).unwrap();
    assert!(!top.loaded);
    assert!(top.cpu_cores_used.top_workloads.is_empty());
    assert_eq!(top.cpu_cores_used.total_usage, 0.0);
}

#[tokio::test]
async fn test_top_workloads_surfaces_first_error() {
    let (app, state, _) = setup_test_app(
        MockFetcher::new()
            .err(CPU_QUERY, "cpu query timed out")
            .err(MEMORY_QUERY, "memory query timed out"),
    )
    .await;
    refresh_and_settle(&state).await;

    let (_, body) = get(app, "/api/v1/top-workloads").await;
    let top: TopWorkloadsResponse = serde_json::from_slice(&body).unwrap();
    assert!(!top.loaded);
    assert_eq!(top.error.as_deref(), Some("cpu query timed out"));
}

#[tokio::test]
async fn test_usage_lists_every_workload() {
    let (app, state, _) = setup_test_app(healthy_fetcher()).await;
    refresh_and_settle(&state).await;

    let (status, body) = get(app, "/api/v1/usage").await;
    assert_eq!(status, StatusCode::OK);

    let usage: UsageResponse = serde_json::from_slice(&body).unwrap();
    assert!(usage.loaded);
    assert_eq!(usage.workloads.len(), 3);

    let ray = &usage.workloads[0];
    assert_eq!(ray.name, "ray-a");
    assert_eq!(ray.namespace.as_deref(), Some("ml"));
    assert_eq!(ray.owner.as_ref().map(|o| o.kind), Some(OwnerKind::RayCluster));
    assert_eq!(ray.cpu_cores_used, Some(2.5));
    assert_eq!(ray.memory_bytes_used, Some(1024.0));

    let job = &usage.workloads[1];
    assert_eq!(job.cpu_cores_used, Some(4.0));
    assert_eq!(job.memory_bytes_used, None);

    let orphan = &usage.workloads[2];
    assert!(orphan.owner.is_none());
    assert_eq!(orphan.cpu_cores_used, None);
}

#[tokio::test]
async fn test_refresh_returns_accepted_and_fetches() {
    let (app, state, fetcher) = setup_test_app(healthy_fetcher()).await;
    let mut receivers = state.coordinator.subscribe();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::timeout(
        Duration::from_secs(5),
        receivers.cpu_cores_used.wait_for(|s| s.loaded),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(fetcher.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_refresh_rejects_get() {
    let (app, _state, _) = setup_test_app(healthy_fetcher()).await;

    let (status, _) = get(app, "/api/v1/refresh").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state, _) = setup_test_app(healthy_fetcher()).await;
    refresh_and_settle(&state).await;
    state.coordinator.top_workloads_by_usage(&state.workloads);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("workload_usage_fetch_latency_seconds_bucket"));
    assert!(metrics_text.contains("workload_usage_refreshes_total"));
    assert!(metrics_text.contains("workload_usage_ranking_recomputations_total"));
    assert!(metrics_text.contains("workload_usage_indexed_owners"));
}
