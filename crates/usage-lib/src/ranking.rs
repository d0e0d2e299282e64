//! Top-K ranking of workloads by usage
//!
//! Produces, per dimension, the five largest consumers followed by either
//! the single remaining workload or an "other" bucket summing the rest.

use crate::models::{
    Dimension, PerDimension, RankedEntrySummary, RankedUsageSummary, Workload, WorkloadUsage,
};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

/// Number of workloads always shown individually
pub const TOP_WORKLOADS: usize = 5;

/// Label used for the remainder bucket
pub const OTHER_LABEL: &str = "other";

/// Subject of a ranked entry
#[derive(Debug, Clone, PartialEq)]
pub enum RankedWorkload<W> {
    Workload(W),
    /// Remainder bucket; serializes as `"other"`
    Other,
}

impl<W: Serialize> Serialize for RankedWorkload<W> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RankedWorkload::Workload(workload) => workload.serialize(serializer),
            RankedWorkload::Other => serializer.serialize_str(OTHER_LABEL),
        }
    }
}

impl<W> RankedWorkload<W> {
    pub fn is_other(&self) -> bool {
        matches!(self, RankedWorkload::Other)
    }

    pub fn workload(&self) -> Option<&W> {
        match self {
            RankedWorkload::Workload(w) => Some(w),
            RankedWorkload::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry<W> {
    pub workload: RankedWorkload<W>,
    pub usage: f64,
}

/// Ranking of one dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedUsage<W> {
    /// Sum over every workload with a defined usage, bucketed or not
    pub total_usage: f64,
    /// At most `TOP_WORKLOADS + 1` entries, largest first
    pub top_workloads: Vec<RankedEntry<W>>,
}

impl<W> Default for RankedUsage<W> {
    fn default() -> Self {
        Self {
            total_usage: 0.0,
            top_workloads: Vec::new(),
        }
    }
}

/// Rankings for every dimension
pub type TopWorkloadsByUsage<W> = PerDimension<RankedUsage<W>>;

fn total_usage<W>(entries: &[RankedEntry<W>]) -> f64 {
    entries.iter().map(|entry| entry.usage).sum()
}

/// Rank `workloads` by their usage in `dimension`
///
/// Workloads without a value are left out. Equal usages keep their input
/// order.
pub fn rank_dimension<W, F>(workloads: &[W], usage_fn: F, dimension: Dimension) -> RankedUsage<W>
where
    W: Clone,
    F: Fn(&W) -> WorkloadUsage,
{
    let mut sorted: Vec<RankedEntry<W>> = workloads
        .iter()
        .filter_map(|workload| {
            usage_fn(workload)[dimension].map(|usage| RankedEntry {
                workload: RankedWorkload::Workload(workload.clone()),
                usage,
            })
        })
        .collect();
    // Stable: ties keep input order
    sorted.sort_by(|a, b| b.usage.partial_cmp(&a.usage).unwrap_or(Ordering::Equal));

    let total = total_usage(&sorted);
    let remainder = sorted.split_off(sorted.len().min(TOP_WORKLOADS));

    let mut top_workloads = sorted;
    match remainder.len() {
        0 => {}
        1 => top_workloads.extend(remainder),
        _ => top_workloads.push(RankedEntry {
            workload: RankedWorkload::Other,
            usage: total_usage(&remainder),
        }),
    }

    RankedUsage {
        total_usage: total,
        top_workloads,
    }
}

/// Rank `workloads` in every dimension
pub fn top_resource_consuming_workloads<W, F>(workloads: &[W], usage_fn: F) -> TopWorkloadsByUsage<W>
where
    W: Clone,
    F: Fn(&W) -> WorkloadUsage,
{
    PerDimension::from_fn(|dimension| rank_dimension(workloads, &usage_fn, dimension))
}

impl RankedUsage<Workload> {
    /// Wire form keyed by workload name
    pub fn summarize(&self) -> RankedUsageSummary {
        RankedUsageSummary {
            total_usage: self.total_usage,
            top_workloads: self
                .top_workloads
                .iter()
                .map(|entry| RankedEntrySummary {
                    workload: match &entry.workload {
                        RankedWorkload::Workload(w) => w.name().to_string(),
                        RankedWorkload::Other => OTHER_LABEL.to_string(),
                    },
                    is_other: entry.workload.is_other(),
                    usage: entry.usage,
                })
                .collect(),
        }
    }
}
