//! Flat, canonical serde model for the persisted snapshot.
//!
//! Records are sorted by identifier before serialization, so two snapshots
//! built from the same input are byte-identical on disk regardless of the
//! order units were analyzed in.

use super::{EdgeKind, GraphNode, NodeId, PendingRef, SnapshotBuilder, SnapshotGraph, UnitDescriptor};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    /// Qualified name of the unit that asserted the edge.
    pub unit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StorageSnapshot {
    pub version: u32,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<StorageEdge>,
    pub pending: Vec<PendingRef>,
    pub units: Vec<UnitDescriptor>,
}

pub fn to_storage(graph: &SnapshotGraph) -> StorageSnapshot {
    let nodes: Vec<GraphNode> = graph.nodes().cloned().collect();

    let topology = graph.topology();
    let mut edges: Vec<StorageEdge> = topology
        .edge_references()
        .map(|e| StorageEdge {
            from: topology[e.source()].id.clone(),
            to: topology[e.target()].id.clone(),
            kind: e.weight().kind,
            unit: e.weight().unit.clone(),
        })
        .collect();
    edges.sort();

    let pending: Vec<PendingRef> = graph.pending().iter().cloned().collect();
    let units: Vec<UnitDescriptor> = graph
        .units()
        .values()
        .map(|entry| entry.descriptor.clone())
        .collect();

    StorageSnapshot {
        version: CURRENT_VERSION,
        nodes,
        edges,
        pending,
        units,
    }
}

pub fn from_storage(storage: StorageSnapshot) -> Result<SnapshotGraph, String> {
    if storage.version != CURRENT_VERSION {
        return Err(format!(
            "unsupported snapshot version {} (expected {})",
            storage.version, CURRENT_VERSION
        ));
    }

    let mut builder = SnapshotBuilder::new();

    for descriptor in storage.units {
        let owned: Vec<NodeId> = storage
            .nodes
            .iter()
            .filter(|n| n.unit == descriptor.qualified_name)
            .map(|n| n.id.clone())
            .collect();
        builder.record_unit(descriptor, owned);
    }
    for node in storage.nodes {
        builder.upsert_node(node);
    }
    for edge in storage.edges {
        if !builder.add_edge(&edge.from, &edge.to, edge.kind, &edge.unit) {
            return Err(format!(
                "dangling edge {} -> {} in stored snapshot",
                edge.from, edge.to
            ));
        }
    }
    for pending in storage.pending {
        builder.add_pending(pending);
    }

    Ok(builder.build())
}
