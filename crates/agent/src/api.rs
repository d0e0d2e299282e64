//! HTTP API for health checks, Prometheus metrics and usage rankings

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use usage_lib::{
    sync_health, ComponentStatus, CoordinatorState, HealthRegistry, OwnerKey, OwnerResolver,
    RankedUsageSummary, UsageCoordinator, UsageMetrics, Workload,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: UsageMetrics,
    pub coordinator: Arc<UsageCoordinator>,
    pub workloads: Arc<[Workload]>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: UsageMetrics,
        coordinator: Arc<UsageCoordinator>,
        workloads: Arc<[Workload]>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            coordinator,
            workloads,
        }
    }
}

/// Body of `GET /api/v1/top-workloads`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopWorkloadsResponse {
    pub loaded: bool,
    pub error: Option<String>,
    pub cpu_cores_used: RankedUsageSummary,
    pub memory_bytes_used: RankedUsageSummary,
}

/// One workload of `GET /api/v1/usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadUsageRecord {
    pub name: String,
    pub namespace: Option<String>,
    pub owner: Option<OwnerKey>,
    pub cpu_cores_used: Option<f64>,
    pub memory_bytes_used: Option<f64>,
}

/// Body of `GET /api/v1/usage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub loaded: bool,
    pub error: Option<String>,
    pub workloads: Vec<WorkloadUsageRecord>,
}

fn error_message(state: &CoordinatorState) -> Option<String> {
    state.error.as_ref().map(|e| e.to_string())
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sync_health(&state.coordinator, &state.health_registry).await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once every dimension has loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sync_health(&state.coordinator, &state.health_registry).await;
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn top_workloads(State(state): State<Arc<AppState>>) -> Json<TopWorkloadsResponse> {
    let coordinator_state = state.coordinator.state();
    let ranking = state.coordinator.top_workloads_by_usage(&state.workloads);
    state.metrics.set_workloads_tracked(state.workloads.len());

    Json(TopWorkloadsResponse {
        loaded: coordinator_state.loaded,
        error: error_message(&coordinator_state),
        cpu_cores_used: ranking.cpu_cores_used.summarize(),
        memory_bytes_used: ranking.memory_bytes_used.summarize(),
    })
}

async fn usage(State(state): State<Arc<AppState>>) -> Json<UsageResponse> {
    let coordinator_state = state.coordinator.state();
    let snapshot = state.coordinator.snapshot();
    let resolver = state.coordinator.resolver();

    let workloads = state
        .workloads
        .iter()
        .map(|workload| {
            let owner = resolver.resolve(workload);
            let usage = match &owner {
                Some(owner) => snapshot.owner_usage(owner),
                None => Default::default(),
            };
            WorkloadUsageRecord {
                name: workload.name().to_string(),
                namespace: workload.metadata.namespace.clone(),
                owner,
                cpu_cores_used: usage.cpu_cores_used,
                memory_bytes_used: usage.memory_bytes_used,
            }
        })
        .collect();

    Json(UsageResponse {
        loaded: coordinator_state.loaded,
        error: error_message(&coordinator_state),
        workloads,
    })
}

/// Trigger a refresh of every dimension; results land asynchronously
async fn refresh(State(state): State<Arc<AppState>>) -> StatusCode {
    state.coordinator.refresh();
    StatusCode::ACCEPTED
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/top-workloads", get(top_workloads))
        .route("/api/v1/usage", get(usage))
        .route("/api/v1/refresh", post(refresh))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
