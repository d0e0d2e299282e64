//! Prometheus instant-query types and the per-dimension queries

use crate::models::{Dimension, OwnerKind};
use serde::{Deserialize, Serialize};

/// Instant-query response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: QueryData,
    #[serde(default, rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryData {
    #[serde(default, rename = "resultType")]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<QuerySample>,
}

/// One series of a vector result, labelled with its owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySample {
    #[serde(default)]
    pub metric: OwnerLabels,
    /// `[timestamp, "value"]`
    #[serde(default)]
    pub value: Option<(f64, Option<String>)>,
}

impl QuerySample {
    pub fn new(kind: &str, name: &str, value: Option<&str>) -> Self {
        Self {
            metric: OwnerLabels {
                owner_kind: Some(kind.to_string()),
                owner_name: Some(name.to_string()),
            },
            value: Some((0.0, value.map(str::to_string))),
        }
    }

    /// The raw value string, if the sample carried one
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(|(_, v)| v.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerLabels {
    #[serde(default)]
    pub owner_kind: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
}

impl QueryResponse {
    /// Build a successful vector response from samples
    pub fn from_samples(result: Vec<QuerySample>) -> Self {
        Self {
            status: "success".to_string(),
            data: QueryData {
                result_type: "vector".to_string(),
                result,
            },
            error_type: None,
            error: None,
        }
    }
}

fn owner_kind_regex() -> String {
    OwnerKind::ALL
        .iter()
        .map(OwnerKind::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

/// PromQL returning current usage per owner for `dimension` in `namespace`
pub fn dimension_query(dimension: Dimension, namespace: &str) -> String {
    let series = match dimension {
        Dimension::CpuCoresUsed => {
            "node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate"
        }
        Dimension::MemoryBytesUsed => {
            "node_namespace_pod_container:container_memory_working_set_bytes"
        }
    };
    format!(
        "sum by(owner_name, owner_kind) (kube_pod_owner{{owner_kind=~\"{kinds}\", namespace=\"{namespace}\"}} \
         * on (namespace, pod) group_right(owner_name, owner_kind) {series})",
        kinds = owner_kind_regex(),
    )
}
