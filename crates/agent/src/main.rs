//! Usage Agent - Workload resource usage ranking service
//!
//! Periodically queries Prometheus for per-owner CPU and memory usage,
//! ranks the configured workloads and serves the result over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usage_agent::{api, config::AgentConfig, workloads};
use usage_lib::{
    register_dimension_components, CoordinatorBuilder, HealthRegistry, PrometheusFetcher,
    RefreshLoopBuilder, StructuredLogger, UsageMetrics,
};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting usage-agent");

    let config = AgentConfig::load()?;
    info!(
        namespace = %config.namespace,
        prometheus_url = %config.prometheus_url,
        "Agent configured"
    );

    let workloads = workloads::load_workloads(config.workloads_file.as_deref())?;

    let fetcher = PrometheusFetcher::new(&config.prometheus_url, config.request_timeout())
        .context("Failed to create Prometheus fetcher")?;
    let coordinator = Arc::new(
        CoordinatorBuilder::new()
            .fetcher(Arc::new(fetcher))
            .namespace(config.namespace.clone())
            .build()?,
    );

    let health_registry = HealthRegistry::new();
    register_dimension_components(&health_registry).await;

    let metrics = UsageMetrics::new();
    metrics.set_workloads_tracked(workloads.len());

    let logger = StructuredLogger::new(&config.namespace);
    logger.log_startup(AGENT_VERSION, &config.prometheus_url, workloads.len());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let refresh_loop = RefreshLoopBuilder::new()
        .coordinator(coordinator.clone())
        .health(health_registry.clone())
        .interval(config.refresh_interval())
        .build()?;
    let loop_handle = tokio::spawn(refresh_loop.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(
        health_registry,
        metrics,
        coordinator,
        workloads,
    ));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    loop_handle.await.context("Refresh loop panicked")?;
    info!("Shutting down");

    Ok(())
}
