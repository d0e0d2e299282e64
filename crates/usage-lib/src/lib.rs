//! Workload usage ranking library
//!
//! This crate provides the core functionality for:
//! - Indexing Prometheus usage samples by owning controller
//! - Resolving each workload's current CPU and memory usage
//! - Ranking the top consuming workloads with an "other" remainder
//! - Coordinating independently refreshed usage dimensions
//! - Health checks and observability

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod health;
pub mod index;
pub mod models;
pub mod observability;
pub mod query;
pub mod ranking;
pub mod refresh_loop;

pub use aggregate::{OwnerReferenceResolver, OwnerResolver, UsageSnapshot};
pub use coordinator::{CoordinatorBuilder, CoordinatorState, FetchState, UsageCoordinator};
pub use error::{FetchError, FetchResult};
pub use fetch::{MetricFetcher, PrometheusFetcher};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use index::{index_by_owner, UsageIndex};
pub use models::*;
pub use observability::{StructuredLogger, UsageMetrics};
pub use ranking::{
    rank_dimension, top_resource_consuming_workloads, RankedEntry, RankedUsage, RankedWorkload,
    TopWorkloadsByUsage,
};
pub use refresh_loop::{
    register_dimension_components, sync_health, RefreshLoop, RefreshLoopBuilder, RefreshLoopConfig,
};
