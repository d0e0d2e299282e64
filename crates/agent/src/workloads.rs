//! Loading the workload list to rank

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use usage_lib::{Workload, WorkloadList};

/// Accepts both `kubectl get -o json` list output and a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum WorkloadFile {
    List(WorkloadList),
    Items(Vec<Workload>),
}

/// Parse a workload list from JSON
pub fn parse_workloads(json: &str) -> Result<Arc<[Workload]>> {
    let file: WorkloadFile = serde_json::from_str(json).context("Invalid workloads JSON")?;
    let items = match file {
        WorkloadFile::List(list) => list.items,
        WorkloadFile::Items(items) => items,
    };
    Ok(items.into())
}

/// Load the workload list from `path`, or an empty list when unset
pub fn load_workloads(path: Option<&Path>) -> Result<Arc<[Workload]>> {
    let Some(path) = path else {
        return Ok(Arc::from(Vec::new()));
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workloads file {}", path.display()))?;
    parse_workloads(&content).with_context(|| format!("Failed to load {}", path.display()))
}
