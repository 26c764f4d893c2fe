mod common;

use common::{class_calling, class_with_method, subclass_with_method, write_class};
use jarscope_core::model::storage::to_storage;
use jarscope_core::model::{Direction, EdgeKind, NodeId, SnapshotGraph};
use jarscope_core::query::QueryEngine;
use jarscope_core::store::{MemoryStore, SnapshotStore, StoreError};
use jarscope_core::{IndexEngine, IndexError};
use std::fs;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn deleting_a_unit_demotes_foreign_edges_to_pending() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.A",
        &class_calling("com/example/A", "com/example/B", "work"),
    );
    let b_path = write_class(
        dir.path(),
        "com.example.B",
        &class_with_method("com/example/B", "work"),
    );

    let engine = IndexEngine::in_memory();
    let roots = vec![dir.path().to_path_buf()];
    engine.run_index(roots.clone()).await.unwrap();

    fs::remove_file(&b_path).unwrap();
    let summary = engine.run_index(roots.clone()).await.unwrap();
    assert_eq!(summary.units_removed, 1);
    assert_eq!(summary.units_analyzed, 0);

    let snapshot = engine.snapshot().unwrap();
    // B's nodes are gone; A's survive untouched.
    assert!(!snapshot.contains(&NodeId::class("com.example.B")));
    assert!(snapshot.contains(&NodeId::method("com.example.A", "run", "()V")));
    // The call A made is parked, not lost.
    let queries = QueryEngine::new(&snapshot);
    assert!(
        queries
            .unresolved_refs(Some("com.example.A"))
            .iter()
            .any(|p| p.target == NodeId::method("com.example.B", "work", "()V")
                && p.kind == EdgeKind::Calls)
    );
}

#[tokio::test]
async fn restoring_a_deleted_unit_converges_to_the_original_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.A",
        &class_calling("com/example/A", "com/example/B", "work"),
    );
    let b_bytes = class_with_method("com/example/B", "work");
    let b_path = write_class(dir.path(), "com.example.B", &b_bytes);

    let engine = IndexEngine::in_memory();
    let roots = vec![dir.path().to_path_buf()];
    engine.run_index(roots.clone()).await.unwrap();
    let original = rmp_serde::to_vec_named(&to_storage(&engine.snapshot().unwrap())).unwrap();

    fs::remove_file(&b_path).unwrap();
    engine.run_index(roots.clone()).await.unwrap();

    fs::write(&b_path, &b_bytes).unwrap();
    engine.run_index(roots).await.unwrap();
    let restored = rmp_serde::to_vec_named(&to_storage(&engine.snapshot().unwrap())).unwrap();

    assert_eq!(original, restored);
}

/// The enclosing->nested CONTAINS edge is asserted by the nested unit, so
/// removing the enclosing unit must park it rather than drop it, and
/// restoring the enclosing unit must bring it back without re-analyzing the
/// unchanged nested unit.
#[tokio::test]
async fn nested_containment_survives_deleting_the_enclosing_unit() {
    let dir = tempfile::tempdir().unwrap();
    let outer_bytes = class_with_method("com/example/Outer", "run");
    let outer_path = write_class(dir.path(), "com.example.Outer", &outer_bytes);
    write_class(
        dir.path(),
        "com.example.Outer$Inner",
        &class_with_method("com/example/Outer$Inner", "go"),
    );

    let engine = IndexEngine::in_memory();
    let roots = vec![dir.path().to_path_buf()];
    engine.run_index(roots.clone()).await.unwrap();

    let outer = NodeId::class("com.example.Outer");
    let inner = NodeId::class("com.example.Outer$Inner");
    let contained = engine
        .query(|q| {
            q.neighbors(&outer, Direction::Outgoing, Some(&[EdgeKind::Contains]))
                .nodes
                .iter()
                .any(|n| n.id == inner)
        })
        .unwrap();
    assert!(contained);

    fs::remove_file(&outer_path).unwrap();
    engine.run_index(roots.clone()).await.unwrap();
    let snapshot = engine.snapshot().unwrap();
    assert!(!snapshot.contains(&outer));
    assert!(snapshot.contains(&inner));
    // The containment assertion is parked, owned by the nested unit.
    let queries = QueryEngine::new(&snapshot);
    assert!(
        queries
            .unresolved_refs(Some("com.example.Outer$Inner"))
            .iter()
            .any(|p| p.source == outer && p.target == inner && p.kind == EdgeKind::Contains)
    );

    fs::write(&outer_path, &outer_bytes).unwrap();
    let summary = engine.run_index(roots).await.unwrap();
    assert_eq!(summary.units_analyzed, 1);
    let contained = engine
        .query(|q| {
            q.neighbors(&outer, Direction::Outgoing, Some(&[EdgeKind::Contains]))
                .nodes
                .iter()
                .any(|n| n.id == inner)
        })
        .unwrap();
    assert!(contained);
}

/// A subclass indexed before its superclass leaves a tentative OVERRIDES
/// ref; indexing the superclass in a later run must promote it without
/// re-analyzing the subclass.
#[tokio::test]
async fn an_override_resolves_once_its_ancestor_is_indexed() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.Derived",
        &subclass_with_method("com/example/Derived", "com/example/Base", "run"),
    );

    let engine = IndexEngine::in_memory();
    let roots = vec![dir.path().to_path_buf()];
    engine.run_index(roots.clone()).await.unwrap();

    let derived_run = NodeId::method("com.example.Derived", "run", "()V");
    let base_run = NodeId::method("com.example.Base", "run", "()V");
    {
        let snapshot = engine.snapshot().unwrap();
        let queries = QueryEngine::new(&snapshot);
        assert!(
            queries
                .unresolved_from(&derived_run)
                .iter()
                .any(|p| p.tentative && p.kind == EdgeKind::Overrides && p.target == base_run)
        );
    }

    write_class(
        dir.path(),
        "com.example.Base",
        &class_with_method("com/example/Base", "run"),
    );
    let summary = engine.run_index(roots).await.unwrap();
    assert_eq!(summary.units_analyzed, 1);

    let snapshot = engine.snapshot().unwrap();
    let queries = QueryEngine::new(&snapshot);
    let overridden = queries.neighbors(&derived_run, Direction::Outgoing, Some(&[EdgeKind::Overrides]));
    assert_eq!(overridden.nodes.len(), 1);
    assert_eq!(overridden.nodes[0].id, base_run);
    assert!(queries.unresolved_from(&derived_run).is_empty());
}

#[tokio::test]
async fn changing_a_unit_reanalyzes_only_that_unit() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.A",
        &class_calling("com/example/A", "com/example/B", "work"),
    );
    let b_path = write_class(
        dir.path(),
        "com.example.B",
        &class_with_method("com/example/B", "work"),
    );

    let engine = IndexEngine::in_memory();
    let roots = vec![dir.path().to_path_buf()];
    engine.run_index(roots.clone()).await.unwrap();

    // B drops work() in favor of other(); A's call no longer resolves.
    fs::write(&b_path, class_with_method("com/example/B", "other")).unwrap();
    let summary = engine.run_index(roots).await.unwrap();
    assert_eq!(summary.units_analyzed, 1);
    assert_eq!(summary.units_removed, 0);

    let snapshot = engine.snapshot().unwrap();
    assert!(snapshot.contains(&NodeId::method("com.example.B", "other", "()V")));
    assert!(!snapshot.contains(&NodeId::method("com.example.B", "work", "()V")));
    let queries = QueryEngine::new(&snapshot);
    assert!(
        queries
            .callers_of(&NodeId::method("com.example.B", "other", "()V"), None)
            .is_empty()
    );
    assert!(
        queries
            .unresolved_refs(Some("com.example.A"))
            .iter()
            .any(|p| p.target == NodeId::method("com.example.B", "work", "()V"))
    );
}

/// Rejects every commit; the engine must surface the failure and leave the
/// prior snapshot in place.
struct RejectingStore {
    inner: MemoryStore,
}

impl SnapshotStore for RejectingStore {
    fn load(&self) -> Result<Arc<SnapshotGraph>, StoreError> {
        self.inner.load()
    }

    fn commit(&self, _snapshot: Arc<SnapshotGraph>) -> Result<(), StoreError> {
        Err(StoreError::Rejected("disk full".into()))
    }
}

#[tokio::test]
async fn failed_commit_leaves_the_prior_snapshot_visible() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.B",
        &class_with_method("com/example/B", "work"),
    );

    let store = Arc::new(RejectingStore {
        inner: MemoryStore::new(),
    });
    let engine = IndexEngine::new(store.clone());
    let result = engine.run_index(vec![dir.path().to_path_buf()]).await;
    assert!(matches!(result, Err(IndexError::Reconciliation(_))));
    assert_eq!(store.load().unwrap().node_count(), 0);
}

/// Holds every commit until released, so a second run can be attempted
/// while the first is still inside the engine.
struct GatedStore {
    inner: MemoryStore,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl SnapshotStore for GatedStore {
    fn load(&self) -> Result<Arc<SnapshotGraph>, StoreError> {
        self.inner.load()
    }

    fn commit(&self, snapshot: Arc<SnapshotGraph>) -> Result<(), StoreError> {
        self.entered.lock().unwrap().send(()).ok();
        self.release.lock().unwrap().recv().ok();
        self.inner.commit(snapshot)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_second_run_is_rejected_while_one_is_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.B",
        &class_with_method("com/example/B", "work"),
    );

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel();
    let store = Arc::new(GatedStore {
        inner: MemoryStore::new(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = Arc::new(IndexEngine::new(store));

    let roots = vec![dir.path().to_path_buf()];
    let first = {
        let engine = engine.clone();
        let roots = roots.clone();
        tokio::spawn(async move { engine.run_index(roots).await })
    };

    // Wait until the first run reaches its commit.
    tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
        .await
        .unwrap();
    let second = engine.run_index(roots).await;
    assert!(matches!(second, Err(IndexError::ConcurrentRun)));

    release_tx.send(()).unwrap();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.units_analyzed, 1);
}

#[tokio::test]
async fn cancellation_before_commit_leaves_the_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write_class(
        dir.path(),
        "com.example.B",
        &class_with_method("com/example/B", "work"),
    );

    let engine = IndexEngine::in_memory();
    let token = CancellationToken::new();
    token.cancel();
    let result = engine
        .run_index_cancellable(vec![dir.path().to_path_buf()], token)
        .await;
    assert!(matches!(result, Err(IndexError::Cancelled)));
    assert_eq!(engine.snapshot().unwrap().node_count(), 0);
}
