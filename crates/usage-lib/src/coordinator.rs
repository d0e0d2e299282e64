//! Refresh coordination across usage dimensions
//!
//! Each dimension owns an independently fetched [`UsageIndex`] published
//! through a `watch` channel. The coordinator combines their loaded/error
//! state and derives per-workload usage and the top-workload ranking from
//! whatever snapshots are current.
//!
//! Fetches are fire-and-forget and never cancelled. When two refreshes of
//! the same dimension overlap, whichever response lands last wins, even
//! if it belongs to the older request.

use crate::aggregate::{OwnerReferenceResolver, OwnerResolver, UsageSnapshot};
use crate::error::FetchError;
use crate::fetch::MetricFetcher;
use crate::index::{index_by_owner_with_stats, UsageIndex};
use crate::models::{Dimension, PerDimension, Workload, WorkloadUsage};
use crate::observability::{StructuredLogger, UsageMetrics};
use crate::query::dimension_query;
use crate::ranking::{top_resource_consuming_workloads, TopWorkloadsByUsage};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Fetch state of a single dimension
#[derive(Debug, Clone)]
pub struct FetchState {
    /// Latest successfully indexed response; empty until the first success
    pub data: Arc<UsageIndex>,
    /// Whether a fetch has succeeded at least once
    pub loaded: bool,
    /// Error of the latest fetch, cleared by the next success
    pub error: Option<Arc<FetchError>>,
}

impl Default for FetchState {
    fn default() -> Self {
        Self {
            data: Arc::new(UsageIndex::empty()),
            loaded: false,
            error: None,
        }
    }
}

/// Combined state over every dimension
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    pub loaded: bool,
    pub error: Option<Arc<FetchError>>,
}

struct DimensionSource {
    dimension: Dimension,
    query: String,
    fetcher: Arc<dyn MetricFetcher>,
    state: Arc<watch::Sender<FetchState>>,
}

impl DimensionSource {
    fn new(dimension: Dimension, query: String, fetcher: Arc<dyn MetricFetcher>) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            dimension,
            query,
            fetcher,
            state: Arc::new(state),
        }
    }

    fn current(&self) -> FetchState {
        self.state.borrow().clone()
    }

    fn spawn_fetch(&self, runtime: &Handle, metrics: &UsageMetrics, logger: &StructuredLogger) {
        let dimension = self.dimension;
        let query = self.query.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let metrics = metrics.clone();
        let logger = logger.clone();

        runtime.spawn(async move {
            let start = Instant::now();
            let result = fetcher.query(&query).await;
            let elapsed = start.elapsed();
            metrics.observe_fetch_latency(dimension, elapsed.as_secs_f64());

            match result {
                Ok(response) => {
                    let (index, stats) = index_by_owner_with_stats(Some(&response));
                    metrics.add_samples_dropped(dimension, stats.dropped);
                    metrics.set_indexed_owners(dimension, index.len());
                    logger.log_fetch_completed(
                        dimension,
                        index.len(),
                        stats.dropped,
                        elapsed.as_millis(),
                    );

                    let index = Arc::new(index);
                    state.send_modify(|current| {
                        current.data = index;
                        current.loaded = true;
                        current.error = None;
                    });
                }
                Err(e) => {
                    metrics.inc_fetch_errors(dimension);
                    logger.log_fetch_failed(dimension, &e.to_string());

                    let error = Arc::new(e);
                    state.send_modify(|current| current.error = Some(error));
                }
            }
        });
    }
}

/// Last computed ranking and the inputs it was computed from
struct RankingMemo<W> {
    indices: PerDimension<Arc<UsageIndex>>,
    workloads: Arc<[W]>,
    ranking: Arc<TopWorkloadsByUsage<W>>,
}

impl<W> RankingMemo<W> {
    fn matches(&self, indices: &PerDimension<Arc<UsageIndex>>, workloads: &Arc<[W]>) -> bool {
        Arc::ptr_eq(&self.workloads, workloads)
            && Dimension::ALL
                .iter()
                .all(|&d| Arc::ptr_eq(&self.indices[d], &indices[d]))
    }
}

/// Owns the per-dimension usage sources and the derived ranking
pub struct UsageCoordinator<W = Workload, R = OwnerReferenceResolver> {
    sources: PerDimension<DimensionSource>,
    resolver: R,
    runtime: Handle,
    metrics: UsageMetrics,
    logger: StructuredLogger,
    memo: Mutex<Option<RankingMemo<W>>>,
}

impl<W, R> UsageCoordinator<W, R>
where
    W: Clone,
    R: OwnerResolver<W>,
{
    /// Trigger a fetch for every dimension without waiting for any of them
    pub fn refresh(&self) {
        self.metrics.inc_refreshes();
        self.logger.log_refresh(Dimension::ALL.len());
        for (_, source) in self.sources.iter() {
            source.spawn_fetch(&self.runtime, &self.metrics, &self.logger);
        }
    }

    /// Loaded when every dimension has loaded; error of the first failing dimension
    pub fn state(&self) -> CoordinatorState {
        let states = self.dimension_states();
        let loaded = states.iter().all(|(_, s)| s.loaded);
        let error = states.iter().find_map(|(_, s)| s.error.clone());
        CoordinatorState { loaded, error }
    }

    pub fn dimension_state(&self, dimension: Dimension) -> FetchState {
        self.sources[dimension].current()
    }

    pub fn dimension_states(&self) -> PerDimension<FetchState> {
        PerDimension::from_fn(|d| self.sources[d].current())
    }

    /// Receivers notified whenever a dimension's state is replaced
    pub fn subscribe(&self) -> PerDimension<watch::Receiver<FetchState>> {
        PerDimension::from_fn(|d| self.sources[d].state.subscribe())
    }

    /// Current index of every dimension
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot::new(PerDimension::from_fn(|d| {
            Arc::clone(&self.sources[d].state.borrow().data)
        }))
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn current_usage(&self, workload: &W) -> WorkloadUsage {
        self.snapshot().current_usage(&self.resolver, workload)
    }

    /// Top workloads per dimension
    ///
    /// Recomputed only when an index or the workload list is a different
    /// allocation than last time; otherwise the cached ranking is shared.
    pub fn top_workloads_by_usage(&self, workloads: &Arc<[W]>) -> Arc<TopWorkloadsByUsage<W>> {
        let snapshot = self.snapshot();

        if let Some(memo) = self.memo.lock().as_ref() {
            if memo.matches(snapshot.indices(), workloads) {
                return Arc::clone(&memo.ranking);
            }
        }

        let ranking = Arc::new(top_resource_consuming_workloads(workloads, |w| {
            snapshot.current_usage(&self.resolver, w)
        }));
        self.metrics.inc_ranking_recomputations();
        self.metrics.set_workloads_tracked(workloads.len());
        self.logger.log_ranking(workloads.len());

        *self.memo.lock() = Some(RankingMemo {
            indices: snapshot.indices().clone(),
            workloads: Arc::clone(workloads),
            ranking: Arc::clone(&ranking),
        });
        ranking
    }
}

/// Builder for [`UsageCoordinator`]
pub struct CoordinatorBuilder<W = Workload, R = OwnerReferenceResolver> {
    fetcher: Option<Arc<dyn MetricFetcher>>,
    queries: PerDimension<Option<String>>,
    namespace: Option<String>,
    resolver: R,
    _workload: PhantomData<fn() -> W>,
}

impl CoordinatorBuilder<Workload, OwnerReferenceResolver> {
    /// Builder for Kubernetes workloads resolved by owner reference
    pub fn new() -> Self {
        Self::with_resolver(OwnerReferenceResolver)
    }
}

impl Default for CoordinatorBuilder<Workload, OwnerReferenceResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W, R> CoordinatorBuilder<W, R>
where
    W: Clone,
    R: OwnerResolver<W>,
{
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            fetcher: None,
            queries: PerDimension::default(),
            namespace: None,
            resolver,
            _workload: PhantomData,
        }
    }

    /// Set the fetcher shared by every dimension
    pub fn fetcher(mut self, fetcher: Arc<dyn MetricFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use the standard usage queries scoped to `namespace`
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Override the query for one dimension
    pub fn query(mut self, dimension: Dimension, query: impl Into<String>) -> Self {
        self.queries[dimension] = Some(query.into());
        self
    }

    /// Build the coordinator; must be called from within a tokio runtime
    pub fn build(self) -> Result<UsageCoordinator<W, R>> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| anyhow::anyhow!("Fetcher is required"))?;
        let runtime =
            Handle::try_current().context("Usage coordinator requires a tokio runtime")?;

        let mut queries = self.queries;
        for dimension in Dimension::ALL {
            if queries[dimension].is_none() {
                let namespace = self.namespace.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("No query for {dimension} and no namespace to derive one")
                })?;
                queries[dimension] = Some(dimension_query(dimension, namespace));
            }
        }

        let sources = queries.map(|dimension, query| {
            DimensionSource::new(dimension, query.unwrap_or_default(), Arc::clone(&fetcher))
        });

        Ok(UsageCoordinator {
            sources,
            resolver: self.resolver,
            runtime,
            metrics: UsageMetrics::new(),
            logger: StructuredLogger::new(self.namespace.unwrap_or_default()),
            memo: Mutex::new(None),
        })
    }
}
