//! Per-workload usage aggregation
//!
//! Joins the per-dimension [`UsageIndex`] snapshots with an
//! [`OwnerResolver`] to answer "how much is this workload using now".

use crate::index::UsageIndex;
use crate::models::{OwnerKey, OwnerKind, PerDimension, Workload, WorkloadUsage};
use std::sync::Arc;

/// Maps a workload to the controller that owns it
pub trait OwnerResolver<W: ?Sized>: Send + Sync {
    fn resolve(&self, workload: &W) -> Option<OwnerKey>;
}

impl<W: ?Sized, F> OwnerResolver<W> for F
where
    F: Fn(&W) -> Option<OwnerKey> + Send + Sync,
{
    fn resolve(&self, workload: &W) -> Option<OwnerKey> {
        self(workload)
    }
}

/// Resolves the owner from a workload's owner references
///
/// The first reference whose kind is a known [`OwnerKind`] wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerReferenceResolver;

impl OwnerResolver<Workload> for OwnerReferenceResolver {
    fn resolve(&self, workload: &Workload) -> Option<OwnerKey> {
        workload
            .metadata
            .owner_references
            .iter()
            .find_map(|reference| {
                let kind = reference.kind.parse::<OwnerKind>().ok()?;
                Some(OwnerKey::new(kind, reference.name.clone()))
            })
    }
}

/// Immutable view of one index per dimension
#[derive(Debug, Clone)]
pub struct UsageSnapshot {
    indices: PerDimension<Arc<UsageIndex>>,
}

impl UsageSnapshot {
    pub fn new(indices: PerDimension<Arc<UsageIndex>>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &PerDimension<Arc<UsageIndex>> {
        &self.indices
    }

    /// Usage of the owner identified by `owner` in every dimension
    pub fn owner_usage(&self, owner: &OwnerKey) -> WorkloadUsage {
        PerDimension::from_fn(|dimension| self.indices[dimension].lookup(owner))
    }

    /// Current usage of `workload`; every dimension is `None` when it has no owner
    pub fn current_usage<W, R>(&self, resolver: &R, workload: &W) -> WorkloadUsage
    where
        W: ?Sized,
        R: OwnerResolver<W> + ?Sized,
    {
        match resolver.resolve(workload) {
            Some(owner) => self.owner_usage(&owner),
            None => WorkloadUsage::default(),
        }
    }
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self::new(PerDimension::from_fn(|_| Arc::new(UsageIndex::empty())))
    }
}
