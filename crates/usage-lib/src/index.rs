//! Indexing of query samples by owning controller
//!
//! Turns a raw instant-query result into a [`UsageIndex`]: a table of
//! numeric values per owner name for every [`OwnerKind`].

use crate::models::{OwnerKey, OwnerKind};
use crate::query::{QueryResponse, QuerySample};
use std::collections::HashMap;
use std::ops::Index;
use tracing::trace;

/// Usage values keyed by owner kind, then owner name
///
/// Total over owner kinds: every kind has a (possibly empty) table, so
/// lookups never fail on a missing kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageIndex {
    by_kind: [HashMap<String, f64>; OwnerKind::COUNT],
}

impl UsageIndex {
    /// An index with an empty table for every owner kind
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value recorded for `name` under `kind`
    pub fn get(&self, kind: OwnerKind, name: &str) -> Option<f64> {
        self.by_kind[kind.position()].get(name).copied()
    }

    pub fn lookup(&self, owner: &OwnerKey) -> Option<f64> {
        self.get(owner.kind, &owner.name)
    }

    /// Number of owners with a value, across all kinds
    pub fn len(&self) -> usize {
        self.by_kind.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.iter().all(HashMap::is_empty)
    }

    fn insert(&mut self, kind: OwnerKind, name: String, value: f64) {
        self.by_kind[kind.position()].insert(name, value);
    }
}

impl Index<OwnerKind> for UsageIndex {
    type Output = HashMap<String, f64>;

    fn index(&self, kind: OwnerKind) -> &Self::Output {
        &self.by_kind[kind.position()]
    }
}

/// Outcome counts of one indexing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: usize,
    pub dropped: usize,
}

/// Parse a sample value the way the metrics UI does
///
/// Empty strings and non-finite values (`NaN`, any spelling of infinity)
/// are not usage values. Surrounding whitespace is ignored.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let trimmed = raw.trim();
    let value = if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

fn sample_entry(sample: &QuerySample) -> Option<(OwnerKind, String, f64)> {
    let kind = sample.metric.owner_kind.as_deref()?.parse::<OwnerKind>().ok()?;
    let name = sample.metric.owner_name.clone()?;
    let value = parse_sample_value(sample.value_str()?)?;
    Some((kind, name, value))
}

/// Index a query result by owner, also reporting how many rows were dropped
pub fn index_by_owner_with_stats(response: Option<&QueryResponse>) -> (UsageIndex, IndexStats) {
    let mut index = UsageIndex::empty();
    let mut stats = IndexStats::default();

    let Some(response) = response else {
        return (index, stats);
    };

    for sample in &response.data.result {
        match sample_entry(sample) {
            Some((kind, name, value)) => {
                index.insert(kind, name, value);
                stats.indexed += 1;
            }
            None => {
                stats.dropped += 1;
                trace!(
                    owner_kind = ?sample.metric.owner_kind,
                    owner_name = ?sample.metric.owner_name,
                    value = ?sample.value_str(),
                    "Dropping malformed sample"
                );
            }
        }
    }

    (index, stats)
}

/// Index a query result by owner
///
/// Malformed rows (unknown kind, missing name, absent or non-finite
/// value) are skipped. A repeated owner keeps the last value seen.
pub fn index_by_owner(response: Option<&QueryResponse>) -> UsageIndex {
    index_by_owner_with_stats(response).0
}
