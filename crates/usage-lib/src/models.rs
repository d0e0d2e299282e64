//! Core data models for workload usage ranking

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Controller kinds that can own a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerKind {
    RayCluster,
    Job,
}

impl OwnerKind {
    /// Every owner kind, in declaration order
    pub const ALL: [OwnerKind; 2] = [OwnerKind::RayCluster, OwnerKind::Job];

    /// Number of owner kinds
    pub const COUNT: usize = Self::ALL.len();

    /// Kubernetes kind string
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::RayCluster => "RayCluster",
            OwnerKind::Job => "Job",
        }
    }

    pub(crate) fn position(self) -> usize {
        match self {
            OwnerKind::RayCluster => 0,
            OwnerKind::Job => 1,
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a kind string is not a known owner kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown owner kind: {0}")]
pub struct UnknownOwnerKind(pub String);

impl FromStr for OwnerKind {
    type Err = UnknownOwnerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OwnerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownOwnerKind(s.to_string()))
    }
}

/// Identifies the controller instance a sample or workload belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey {
    pub kind: OwnerKind,
    pub name: String,
}

impl OwnerKey {
    pub fn new(kind: OwnerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Usage dimensions tracked per workload
///
/// Declaration order is the order used when combining per-dimension
/// fetch state, so the CPU error wins over the memory error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CpuCoresUsed,
    MemoryBytesUsed,
}

impl Dimension {
    pub const ALL: [Dimension; 2] = [Dimension::CpuCoresUsed, Dimension::MemoryBytesUsed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::CpuCoresUsed => "cpu_cores_used",
            Dimension::MemoryBytesUsed => "memory_bytes_used",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value for every usage dimension
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerDimension<T> {
    pub cpu_cores_used: T,
    pub memory_bytes_used: T,
}

impl<T> PerDimension<T> {
    /// Build a record by evaluating `f` once per dimension, in order
    pub fn from_fn(mut f: impl FnMut(Dimension) -> T) -> Self {
        Self {
            cpu_cores_used: f(Dimension::CpuCoresUsed),
            memory_bytes_used: f(Dimension::MemoryBytesUsed),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Dimension, T) -> U) -> PerDimension<U> {
        PerDimension {
            cpu_cores_used: f(Dimension::CpuCoresUsed, self.cpu_cores_used),
            memory_bytes_used: f(Dimension::MemoryBytesUsed, self.memory_bytes_used),
        }
    }

    /// Iterate `(dimension, value)` pairs in dimension order
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &T)> {
        Dimension::ALL.into_iter().map(move |d| (d, &self[d]))
    }
}

impl<T> Index<Dimension> for PerDimension<T> {
    type Output = T;

    fn index(&self, dimension: Dimension) -> &T {
        match dimension {
            Dimension::CpuCoresUsed => &self.cpu_cores_used,
            Dimension::MemoryBytesUsed => &self.memory_bytes_used,
        }
    }
}

impl<T> IndexMut<Dimension> for PerDimension<T> {
    fn index_mut(&mut self, dimension: Dimension) -> &mut T {
        match dimension {
            Dimension::CpuCoresUsed => &mut self.cpu_cores_used,
            Dimension::MemoryBytesUsed => &mut self.memory_bytes_used,
        }
    }
}

/// Current usage of one workload; `None` where no sample matched
pub type WorkloadUsage = PerDimension<Option<f64>>;

/// Reference from a workload to its controlling object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

/// Object metadata relevant to usage ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

/// A queued workload as listed from the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub metadata: WorkloadMetadata,
}

impl Workload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: WorkloadMetadata {
                name: name.into(),
                namespace: None,
                owner_references: Vec::new(),
            },
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.metadata.owner_references.push(OwnerReference {
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// List wrapper matching `kubectl get workloads -o json`
///
/// `items` is required so that an arbitrary object is not read as an
/// empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadList {
    pub items: Vec<Workload>,
}

/// One entry of a ranking as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntrySummary {
    /// Workload name, or `"other"` for the remainder bucket
    pub workload: String,
    #[serde(default)]
    pub is_other: bool,
    pub usage: f64,
}

/// A per-dimension ranking as exposed over the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedUsageSummary {
    pub total_usage: f64,
    pub top_workloads: Vec<RankedEntrySummary>,
}
