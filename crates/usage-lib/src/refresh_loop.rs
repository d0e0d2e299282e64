//! Periodic refresh loop
//!
//! Drives [`UsageCoordinator::refresh`] on a fixed interval and mirrors
//! the per-dimension fetch state into the [`HealthRegistry`].

use crate::aggregate::OwnerResolver;
use crate::coordinator::UsageCoordinator;
use crate::health::{components, HealthRegistry};
use crate::models::Dimension;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshLoopConfig {
    /// Time between refreshes; zero refreshes once and then only on shutdown
    pub interval: Duration,
}

impl Default for RefreshLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Periodically refreshes every usage dimension
pub struct RefreshLoop<W, R> {
    coordinator: Arc<UsageCoordinator<W, R>>,
    health: Option<HealthRegistry>,
    config: RefreshLoopConfig,
}

impl<W, R> RefreshLoop<W, R>
where
    W: Clone,
    R: OwnerResolver<W>,
{
    pub fn new(
        coordinator: Arc<UsageCoordinator<W, R>>,
        health: Option<HealthRegistry>,
        config: RefreshLoopConfig,
    ) -> Self {
        Self {
            coordinator,
            health,
            config,
        }
    }

    /// Run until a shutdown signal is received
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting usage refresh loop"
        );

        if self.config.interval.is_zero() {
            self.coordinator.refresh();
            let _ = shutdown.recv().await;
            info!("Shutting down usage refresh loop");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Health reflects what landed since the previous tick
                    self.sync_health().await;
                    self.coordinator.refresh();
                    cycles += 1;
                    debug!(cycles = cycles, "Refresh cycle triggered");
                }
                _ = shutdown.recv() => {
                    info!("Shutting down usage refresh loop");
                    break;
                }
            }
        }
    }

    /// Copy the coordinator's fetch state into the health registry
    pub async fn sync_health(&self) {
        if let Some(health) = &self.health {
            sync_health(&self.coordinator, health).await;
        }
    }
}

/// Mirror each dimension's fetch state into `health` and update readiness
///
/// A dimension serving data from an earlier success is degraded rather
/// than unhealthy.
pub async fn sync_health<W, R>(coordinator: &UsageCoordinator<W, R>, health: &HealthRegistry)
where
    W: Clone,
    R: OwnerResolver<W>,
{
    for (dimension, state) in coordinator.dimension_states().iter() {
        let component = components::for_dimension(dimension);
        match &state.error {
            Some(error) if state.loaded => {
                health
                    .set_degraded(component, format!("Serving stale data: {error}"))
                    .await
            }
            Some(error) => health.set_unhealthy(component, error.to_string()).await,
            None => health.set_healthy(component).await,
        }
    }

    health.set_ready(coordinator.state().loaded).await;
}

/// Builder for creating the refresh loop
pub struct RefreshLoopBuilder<W, R> {
    coordinator: Option<Arc<UsageCoordinator<W, R>>>,
    health: Option<HealthRegistry>,
    config: RefreshLoopConfig,
}

impl<W, R> RefreshLoopBuilder<W, R>
where
    W: Clone,
    R: OwnerResolver<W>,
{
    pub fn new() -> Self {
        Self {
            coordinator: None,
            health: None,
            config: RefreshLoopConfig::default(),
        }
    }

    pub fn coordinator(mut self, coordinator: Arc<UsageCoordinator<W, R>>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Registry to keep in sync; each dimension is registered as a component
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> Result<RefreshLoop<W, R>> {
        let coordinator = self
            .coordinator
            .ok_or_else(|| anyhow::anyhow!("Coordinator is required"))?;

        Ok(RefreshLoop::new(coordinator, self.health, self.config))
    }
}

impl<W, R> Default for RefreshLoopBuilder<W, R>
where
    W: Clone,
    R: OwnerResolver<W>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Register one health component per usage dimension
pub async fn register_dimension_components(health: &HealthRegistry) {
    for dimension in Dimension::ALL {
        health.register(components::for_dimension(dimension)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{CoordinatorBuilder, FetchState};
    use crate::error::{FetchError, FetchResult};
    use crate::fetch::MetricFetcher;
    use crate::health::ComponentStatus;
    use crate::models::Workload;
    use crate::query::{QueryResponse, QuerySample};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock fetcher: cpu always succeeds, memory always fails
    struct MockFetcher {
        call_count: AtomicUsize,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricFetcher for MockFetcher {
        async fn query(&self, query: &str) -> FetchResult<QueryResponse> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if query == "memory" {
                return Err(FetchError::Other("memory backend down".to_string()));
            }
            Ok(QueryResponse::from_samples(vec![QuerySample::new(
                "Job",
                "train",
                Some("1"),
            )]))
        }
    }

    fn coordinator(fetcher: Arc<MockFetcher>) -> Arc<UsageCoordinator> {
        Arc::new(
            CoordinatorBuilder::new()
                .fetcher(fetcher)
                .query(Dimension::CpuCoresUsed, "cpu")
                .query(Dimension::MemoryBytesUsed, "memory")
                .build()
                .unwrap(),
        )
    }

    async fn wait_until(
        rx: &mut tokio::sync::watch::Receiver<FetchState>,
        pred: impl FnMut(&FetchState) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_refresh_loop_config_default() {
        let config = RefreshLoopConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_refresh_loop_builder_missing_coordinator() {
        let result = RefreshLoopBuilder::<Workload, crate::aggregate::OwnerReferenceResolver>::new()
            .interval(Duration::from_secs(5))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_loop_refreshes_until_shutdown() {
        let fetcher = Arc::new(MockFetcher::new());
        let coordinator = coordinator(fetcher.clone());
        let mut receivers = coordinator.subscribe();

        let refresh_loop = RefreshLoopBuilder::new()
            .coordinator(coordinator.clone())
            .interval(Duration::from_millis(20))
            .build()
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(refresh_loop.run(shutdown_rx));

        wait_until(&mut receivers.cpu_cores_used, |s| s.loaded).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(fetcher.call_count.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_zero_interval_refreshes_once() {
        let fetcher = Arc::new(MockFetcher::new());
        let coordinator = coordinator(fetcher.clone());
        let mut receivers = coordinator.subscribe();

        let refresh_loop = RefreshLoop::new(coordinator.clone(), None, RefreshLoopConfig {
            interval: Duration::ZERO,
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(refresh_loop.run(shutdown_rx));

        wait_until(&mut receivers.memory_bytes_used, |s| s.error.is_some()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(fetcher.call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sync_health_reflects_fetch_state() {
        let fetcher = Arc::new(MockFetcher::new());
        let coordinator = coordinator(fetcher);
        let health = HealthRegistry::new();
        register_dimension_components(&health).await;

        let refresh_loop = RefreshLoopBuilder::new()
            .coordinator(coordinator.clone())
            .health(health.clone())
            .build()
            .unwrap();

        let mut receivers = coordinator.subscribe();
        coordinator.refresh();
        wait_until(&mut receivers.cpu_cores_used, |s| s.loaded).await;
        wait_until(&mut receivers.memory_bytes_used, |s| s.error.is_some()).await;

        refresh_loop.sync_health().await;

        let report = health.health().await;
        assert_eq!(report.status, ComponentStatus::Unhealthy);
        assert_eq!(
            report.components[components::CPU_USAGE].status,
            ComponentStatus::Healthy
        );
        let memory = &report.components[components::MEMORY_USAGE];
        assert_eq!(memory.status, ComponentStatus::Unhealthy);
        assert_eq!(memory.message.as_deref(), Some("memory backend down"));

        let readiness = health.readiness().await;
        assert!(!readiness.ready);
    }
}
