//! Usage agent
//!
//! Serves workload usage rankings, health probes and Prometheus metrics
//! over HTTP while periodically refreshing usage from Prometheus.

pub mod api;
pub mod config;
pub mod workloads;
