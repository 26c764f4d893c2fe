//! Reconciliation: fold one run's delta into the prior snapshot.
//!
//! Ownership drives retraction. Every stale unit (removed from the
//! classpath, or rescanned with a new fingerprint) has exactly its own
//! nodes and edge assertions withdrawn; edges asserted by surviving units
//! that touch a withdrawn node are demoted back to pending refs, and the
//! whole pending set is re-attempted against the updated graph before the
//! new snapshot is sealed. The prior snapshot is never touched.

use crate::build::GraphDelta;
use crate::model::{EdgeKind, NodeId, PendingRef, SnapshotBuilder, SnapshotGraph};
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileReport {
    pub units_removed: usize,
    pub nodes_upserted: usize,
    pub edges_upserted: usize,
    pub pending_refs: usize,
}

/// Apply `delta` on top of `prior`. `stale` names every unit whose prior
/// contribution must be withdrawn first; it is a superset of the units the
/// delta re-adds.
pub fn reconcile(
    prior: &SnapshotGraph,
    delta: GraphDelta,
    stale: &BTreeSet<String>,
) -> (SnapshotGraph, ReconcileReport) {
    let mut report = ReconcileReport::default();
    let mut builder = prior.to_builder();

    let readded: BTreeSet<&str> = delta
        .units
        .iter()
        .map(|(unit, _)| unit.qualified_name.as_str())
        .collect();
    for unit in stale {
        if prior.unit(unit).is_some() {
            builder.retract_unit(unit);
            if !readded.contains(unit.as_str()) {
                report.units_removed += 1;
            }
        }
    }

    report.nodes_upserted = delta.nodes.len();
    for node in delta.nodes {
        builder.upsert_node(node);
    }
    for (descriptor, nodes) in delta.units {
        builder.record_unit(descriptor, nodes);
    }

    for (from, to, kind, unit) in delta.edges {
        if builder.add_edge(&from, &to, kind, &unit) {
            report.edges_upserted += 1;
        } else {
            // An endpoint was resolvable at build time but lost to a
            // retraction in this same reconciliation.
            builder.add_pending(PendingRef {
                source_unit: unit,
                source: from,
                target: to,
                kind,
                tentative: false,
            });
        }
    }
    for pending in delta.pending {
        builder.add_pending(pending);
    }

    resolve_pending(&mut builder, &mut report);

    let snapshot = builder.build();
    report.pending_refs = snapshot.pending().len();
    tracing::info!(
        nodes = snapshot.node_count(),
        edges = snapshot.edge_count(),
        pending = report.pending_refs,
        removed = report.units_removed,
        "snapshot reconciled"
    );
    (snapshot, report)
}

/// Re-attempt every pending ref against the updated graph. Plain refs
/// promote as soon as both endpoints exist. Tentative OVERRIDES refs
/// resume the supertype walk at the ancestor they were parked on.
///
/// Runs to a fixpoint: promoting one ref (say an EXTENDS edge) can unblock
/// another (an override walk through that supertype).
fn resolve_pending(builder: &mut SnapshotBuilder, report: &mut ReconcileReport) {
    loop {
        let pending = builder.take_pending();
        let drained = pending.len();
        for entry in pending {
            resolve_one(builder, entry, report);
        }
        if builder.graph().pending().len() >= drained {
            break;
        }
    }
}

// A pending ref can be blocked on either endpoint: usually the target, but
// an enclosing-containment assertion waits on its source. Refs owned by a
// retracted unit are dropped in `retract_unit`, never here.
fn resolve_one(builder: &mut SnapshotBuilder, entry: PendingRef, report: &mut ReconcileReport) {
    if entry.tentative {
        if builder.graph().contains(&entry.source) {
            resume_override_walk(builder, entry, report);
        } else {
            builder.add_pending(entry);
        }
    } else if builder.graph().contains(&entry.source) && builder.graph().contains(&entry.target) {
        if builder.add_edge(&entry.source, &entry.target, entry.kind, &entry.source_unit) {
            report.edges_upserted += 1;
        }
    } else {
        builder.add_pending(entry);
    }
}

fn resume_override_walk(
    builder: &mut SnapshotBuilder,
    entry: PendingRef,
    report: &mut ReconcileReport,
) {
    debug_assert_eq!(entry.kind, EdgeKind::Overrides);
    let (name, descriptor) = match split_method_id(&entry.target) {
        Some(parts) => parts,
        None => return,
    };

    let mut queue = VecDeque::from([entry.target.owner().to_string()]);
    let mut visited = BTreeSet::new();
    let mut first_unknown: Option<String> = None;
    while let Some(ancestor) = queue.pop_front() {
        if !visited.insert(ancestor.clone()) {
            continue;
        }
        if !builder.graph().contains(&NodeId::class(&ancestor)) {
            if first_unknown.is_none() {
                first_unknown = Some(ancestor);
            }
            continue;
        }
        let candidate = NodeId::method(&ancestor, &name, &descriptor);
        if builder.graph().contains(&candidate) {
            if builder.add_edge(&entry.source, &candidate, EdgeKind::Overrides, &entry.source_unit) {
                report.edges_upserted += 1;
            }
            return;
        }
        queue.extend(builder.graph().supertypes_of(&ancestor));
    }
    if let Some(ancestor) = first_unknown {
        // Still blocked; park the walk at the nearest unindexed ancestor.
        builder.add_pending(PendingRef {
            target: NodeId::method(&ancestor, &name, &descriptor),
            ..entry
        });
    }
    // Otherwise the chain is fully known and declares nothing: not an
    // override after all.
}

/// `Type#name(args)ret` -> (`name`, `(args)ret`).
fn split_method_id(id: &NodeId) -> Option<(String, String)> {
    let member = id.as_str().split_once('#')?.1;
    let paren = member.find('(')?;
    Some((member[..paren].to_string(), member[paren..].to_string()))
}
