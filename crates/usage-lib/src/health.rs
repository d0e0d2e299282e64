//! Health check infrastructure for the usage agent
//!
//! Tracks the health of each usage dimension's fetches and whether every
//! dimension has loaded, for Kubernetes liveness and readiness probes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Latest fetch succeeded
    Healthy,
    /// Latest fetch failed but earlier data is still served
    Degraded,
    /// No usable data
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component still serves data
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among `components`; healthy when there are none
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    use crate::models::Dimension;

    pub const CPU_USAGE: &str = "cpu_usage";
    pub const MEMORY_USAGE: &str = "memory_usage";

    /// Component tracking the fetches of `dimension`
    pub fn for_dimension(dimension: Dimension) -> &'static str {
        match dimension {
            Dimension::CpuCoresUsed => CPU_USAGE,
            Dimension::MemoryBytesUsed => MEMORY_USAGE,
        }
    }
}

/// Shared registry of component health and readiness
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    loaded: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record whether every usage dimension has loaded
    pub async fn set_ready(&self, loaded: bool) {
        *self.loaded.write().await = loaded;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once every dimension has loaded and no source is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let loaded = *self.loaded.read().await;
        let status = self.health().await.status;

        let reason = if !loaded {
            Some("Usage data not yet loaded for every dimension")
        } else if !status.is_operational() {
            Some("Usage source unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimension;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_health_registry_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_USAGE).await;

        let health = registry.health().await;
        assert!(health.components.contains_key(components::CPU_USAGE));
        assert_eq!(
            health.components[components::CPU_USAGE].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_health_registry_degraded_status() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_USAGE).await;
        registry.register(components::MEMORY_USAGE).await;

        registry
            .set_degraded(components::CPU_USAGE, "Serving stale data")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
    }

    #[tokio::test]
    async fn test_health_registry_unhealthy_status() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_USAGE).await;
        registry.register(components::MEMORY_USAGE).await;

        registry
            .set_unhealthy(components::MEMORY_USAGE, "connection refused")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_ready_when_set() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_USAGE).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::CPU_USAGE, "Failed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }

    #[test]
    fn test_component_per_dimension() {
        assert_eq!(components::for_dimension(Dimension::CpuCoresUsed), components::CPU_USAGE);
        assert_eq!(
            components::for_dimension(Dimension::MemoryBytesUsed),
            components::MEMORY_USAGE
        );
    }
}
