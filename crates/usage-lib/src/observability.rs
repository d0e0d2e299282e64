//! Observability infrastructure for the usage service
//!
//! Provides:
//! - Prometheus metrics (fetch latency, fetch errors, dropped samples, ranking recomputations)
//! - Structured JSON logging with tracing

use crate::models::Dimension;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Default histogram buckets for fetch latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<UsageMetricsInner> = OnceLock::new();

struct UsageMetricsInner {
    fetch_latency_seconds: HistogramVec,
    fetch_errors: IntCounterVec,
    samples_dropped: IntCounterVec,
    indexed_owners: IntGaugeVec,
    refreshes_triggered: IntCounter,
    ranking_recomputations: IntCounter,
    workloads_tracked: IntGauge,
}

impl UsageMetricsInner {
    fn new() -> Self {
        Self {
            fetch_latency_seconds: register_histogram_vec!(
                "workload_usage_fetch_latency_seconds",
                "Time spent running a usage query against the metrics backend",
                &["dimension"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            fetch_errors: register_int_counter_vec!(
                "workload_usage_fetch_errors_total",
                "Total number of failed usage queries",
                &["dimension"]
            )
            .expect("Failed to register fetch_errors"),

            samples_dropped: register_int_counter_vec!(
                "workload_usage_samples_dropped_total",
                "Samples skipped because of a missing owner or non-numeric value",
                &["dimension"]
            )
            .expect("Failed to register samples_dropped"),

            indexed_owners: register_int_gauge_vec!(
                "workload_usage_indexed_owners",
                "Owners with a usage value in the latest index",
                &["dimension"]
            )
            .expect("Failed to register indexed_owners"),

            refreshes_triggered: register_int_counter!(
                "workload_usage_refreshes_total",
                "Total number of refresh cycles triggered"
            )
            .expect("Failed to register refreshes_triggered"),

            ranking_recomputations: register_int_counter!(
                "workload_usage_ranking_recomputations_total",
                "Total number of times the top workload ranking was recomputed"
            )
            .expect("Failed to register ranking_recomputations"),

            workloads_tracked: register_int_gauge!(
                "workload_usage_workloads_tracked",
                "Number of workloads in the most recently ranked list"
            )
            .expect("Failed to register workloads_tracked"),
        }
    }
}

/// Handle to the process-wide usage metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct UsageMetrics {
    _private: (),
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageMetrics").finish_non_exhaustive()
    }
}

impl UsageMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(UsageMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &UsageMetricsInner {
        GLOBAL_METRICS.get_or_init(UsageMetricsInner::new)
    }

    pub fn observe_fetch_latency(&self, dimension: Dimension, duration_secs: f64) {
        self.inner()
            .fetch_latency_seconds
            .with_label_values(&[dimension.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_fetch_errors(&self, dimension: Dimension) {
        self.inner()
            .fetch_errors
            .with_label_values(&[dimension.as_str()])
            .inc();
    }

    pub fn add_samples_dropped(&self, dimension: Dimension, count: usize) {
        self.inner()
            .samples_dropped
            .with_label_values(&[dimension.as_str()])
            .inc_by(count as u64);
    }

    pub fn set_indexed_owners(&self, dimension: Dimension, count: usize) {
        self.inner()
            .indexed_owners
            .with_label_values(&[dimension.as_str()])
            .set(count as i64);
    }

    pub fn inc_refreshes(&self) {
        self.inner().refreshes_triggered.inc();
    }

    pub fn inc_ranking_recomputations(&self) {
        self.inner().ranking_recomputations.inc();
    }

    pub fn set_workloads_tracked(&self, count: usize) {
        self.inner().workloads_tracked.set(count as i64);
    }
}

/// Structured logger for usage service events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn log_startup(&self, version: &str, prometheus_url: &str, workloads: usize) {
        info!(
            event = "agent_started",
            namespace = %self.namespace,
            agent_version = %version,
            prometheus_url = %prometheus_url,
            workloads = workloads,
            "Workload usage agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            namespace = %self.namespace,
            reason = %reason,
            "Workload usage agent shutting down"
        );
    }

    pub fn log_refresh(&self, dimensions: usize) {
        debug!(
            event = "refresh_triggered",
            namespace = %self.namespace,
            dimensions = dimensions,
            "Triggered usage refresh"
        );
    }

    pub fn log_fetch_completed(
        &self,
        dimension: Dimension,
        owners: usize,
        dropped: usize,
        elapsed_ms: u128,
    ) {
        debug!(
            event = "fetch_completed",
            namespace = %self.namespace,
            dimension = %dimension,
            owners = owners,
            dropped_samples = dropped,
            elapsed_ms = elapsed_ms,
            "Usage index updated"
        );
    }

    pub fn log_fetch_failed(&self, dimension: Dimension, error: &str) {
        warn!(
            event = "fetch_failed",
            namespace = %self.namespace,
            dimension = %dimension,
            error = %error,
            "Usage query failed, keeping previous index"
        );
    }

    pub fn log_ranking(&self, workloads: usize) {
        debug!(
            event = "ranking_recomputed",
            namespace = %self.namespace,
            workloads = workloads,
            "Recomputed top workloads by usage"
        );
    }
}
