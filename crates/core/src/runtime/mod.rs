//! The engine: one snapshot store, at most one indexing run at a time.
//!
//! A run is scan -> analyze -> build -> reconcile -> commit. Readers are
//! never blocked: they hold an `Arc` of the prior snapshot, and the commit
//! is a single pointer (or file) swap at the very end. Any failure before
//! the commit leaves the store exactly as it was.

use crate::analyze::analyze_units;
use crate::build::GraphBuilder;
use crate::error::{IndexError, Result};
use crate::model::{GraphNode, NodeId, RunSummary, SnapshotGraph, UnitDescriptor};
use crate::persist::{ReconcileReport, reconcile};
use crate::query::QueryEngine;
use crate::scan::Scanner;
use crate::store::{MemoryStore, SnapshotStore};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct IndexEngine {
    store: Arc<dyn SnapshotStore>,
    run_lock: Mutex<()>,
}

impl IndexEngine {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            run_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The committed snapshot. Cheap; safe to call during a run.
    pub fn snapshot(&self) -> Result<Arc<SnapshotGraph>> {
        Ok(self.store.load()?)
    }

    /// Run a query closure against the committed snapshot.
    pub fn query<R>(&self, run: impl FnOnce(&QueryEngine<'_>) -> R) -> Result<R> {
        let snapshot = self.snapshot()?;
        Ok(run(&QueryEngine::new(&snapshot)))
    }

    pub fn lookup(&self, id: &NodeId) -> Result<Option<GraphNode>> {
        Ok(self.snapshot()?.get(id).cloned())
    }

    pub async fn run_index(&self, roots: Vec<PathBuf>) -> Result<RunSummary> {
        self.run_index_cancellable(roots, CancellationToken::new())
            .await
    }

    /// Run one indexing pass over `roots`. Fails fast with
    /// [`IndexError::ConcurrentRun`] if another run holds the engine.
    /// Cancellation is honored between phases; once the commit has started
    /// it completes.
    pub async fn run_index_cancellable(
        &self,
        roots: Vec<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| IndexError::ConcurrentRun)?;

        let prior = self.store.load()?;
        let scan = tokio::task::spawn_blocking(move || Scanner::scan(&roots))
            .await
            .map_err(|err| IndexError::Internal(err.to_string()))?;
        if scan.units.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let mut summary = RunSummary {
            units_scanned: scan.units.len(),
            ..RunSummary::default()
        };
        for error in scan.errors {
            summary.record(error);
        }

        let (to_analyze, stale) = partition_scan(&prior, scan.units);
        if to_analyze.is_empty() && stale.is_empty() {
            // Nothing changed; the committed snapshot already reflects the
            // classpath.
            summary.pending_refs = prior.pending().len();
            tracing::info!(units = summary.units_scanned, "classpath unchanged, skipping run");
            return Ok(summary);
        }

        let analysis = tokio::task::spawn_blocking(move || analyze_units(to_analyze))
            .await
            .map_err(|err| IndexError::Internal(err.to_string()))?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        summary.units_analyzed = analysis.analyzed.len();
        summary.units_failed = analysis.errors.len();
        for error in analysis.errors {
            summary.record(error);
        }

        let prior_for_build = prior.clone();
        let (snapshot, report, build_errors) = tokio::task::spawn_blocking(move || {
            let mut delta = GraphBuilder::new(&prior_for_build, &stale).build(analysis.analyzed);
            let errors = std::mem::take(&mut delta.errors);
            let (snapshot, report) = reconcile(&prior_for_build, delta, &stale);
            (snapshot, report, errors)
        })
        .await
        .map_err(|err| IndexError::Internal(err.to_string()))?;
        for error in build_errors {
            summary.record(error);
        }
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        self.store
            .commit(Arc::new(snapshot))
            .map_err(|err| IndexError::Reconciliation(err.to_string()))?;
        apply_report(&mut summary, report);
        tracing::info!(
            scanned = summary.units_scanned,
            analyzed = summary.units_analyzed,
            failed = summary.units_failed,
            removed = summary.units_removed,
            pending = summary.pending_refs,
            "indexing run committed"
        );
        Ok(summary)
    }
}

fn apply_report(summary: &mut RunSummary, report: ReconcileReport) {
    summary.units_removed = report.units_removed;
    summary.nodes_upserted = report.nodes_upserted;
    summary.edges_upserted = report.edges_upserted;
    summary.pending_refs = report.pending_refs;
}

/// Split the scan into units needing analysis and units whose prior
/// contribution must be withdrawn.
///
/// A scanned unit with the fingerprint the snapshot already has is skipped
/// outright. `stale` collects changed units plus every prior unit the scan
/// no longer sees.
fn partition_scan(
    prior: &SnapshotGraph,
    scanned: Vec<UnitDescriptor>,
) -> (Vec<UnitDescriptor>, BTreeSet<String>) {
    let mut stale: BTreeSet<String> = prior.units().keys().cloned().collect();
    let mut to_analyze = Vec::new();
    for unit in scanned {
        match prior.unit(&unit.qualified_name) {
            Some(entry) if entry.descriptor.fingerprint == unit.fingerprint => {
                stale.remove(&unit.qualified_name);
            }
            Some(_) | None => to_analyze.push(unit),
        }
    }
    (to_analyze, stale)
}
