//! The in-memory snapshot graph and its mutable builder.
//!
//! `SnapshotGraph` is immutable once built; mutation goes through
//! `SnapshotBuilder` during reconciliation and ends with a single atomic
//! pointer swap in the store. Every node records its owning unit and every
//! edge the unit that asserted it, so retraction is ownership-driven rather
//! than inferred from reachability.

use super::{EdgeKind, GraphEdge, GraphNode, NodeId, PendingRef, UnitDescriptor};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-unit bookkeeping inside a snapshot.
#[derive(Debug, Clone)]
pub struct UnitEntry {
    pub descriptor: UnitDescriptor,
    /// Ids of the nodes this unit declared, sorted.
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotGraph {
    topology: StableDiGraph<GraphNode, GraphEdge>,
    id_index: BTreeMap<NodeId, NodeIndex>,
    units: BTreeMap<String, UnitEntry>,
    pending: BTreeSet<PendingRef>,
}

impl SnapshotGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn topology(&self) -> &StableDiGraph<GraphNode, GraphEdge> {
        &self.topology
    }

    pub fn node_count(&self) -> usize {
        self.topology.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.edge_count()
    }

    pub fn find_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.find_index(id).map(|idx| &self.topology[idx])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.id_index.contains_key(id)
    }

    /// All nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.id_index.values().map(|&idx| &self.topology[idx])
    }

    pub fn units(&self) -> &BTreeMap<String, UnitEntry> {
        &self.units
    }

    pub fn unit(&self, qualified_name: &str) -> Option<&UnitEntry> {
        self.units.get(qualified_name)
    }

    pub fn pending(&self) -> &BTreeSet<PendingRef> {
        &self.pending
    }

    /// Unresolved references originating at the given node.
    pub fn pending_from(&self, source: &NodeId) -> Vec<&PendingRef> {
        self.pending.iter().filter(|p| &p.source == source).collect()
    }

    /// Direct supertypes (extends + implements) of a type, by qualified name.
    /// Empty when the type itself is not in the graph.
    pub fn supertypes_of(&self, qualified_name: &str) -> Vec<String> {
        let Some(idx) = self.find_index(&NodeId::class(qualified_name)) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .topology
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| {
                matches!(e.weight().kind, EdgeKind::Extends | EdgeKind::Implements)
            })
            .map(|e| self.topology[e.target()].id.as_str().to_string())
            .collect();
        out.sort();
        out
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.topology.node_weights() {
            *nodes_by_kind.entry(node.kind.as_str().to_string()).or_default() += 1;
        }
        let mut edges_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for edge in self.topology.edge_weights() {
            *edges_by_kind.entry(format!("{:?}", edge.kind)).or_default() += 1;
        }
        GraphStats {
            nodes: self.topology.node_count(),
            edges: self.topology.edge_count(),
            pending: self.pending.len(),
            units: self.units.len(),
            nodes_by_kind,
            edges_by_kind,
        }
    }

    pub fn to_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder {
            inner: self.clone(),
        }
    }
}

/// Aggregate counts surfaced to front ends.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub pending: usize,
    pub units: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
}

/// Mutable view used during reconciliation.
pub struct SnapshotBuilder {
    inner: SnapshotGraph,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            inner: SnapshotGraph::empty(),
        }
    }

    pub fn graph(&self) -> &SnapshotGraph {
        &self.inner
    }

    /// Add or replace a node by id.
    pub fn upsert_node(&mut self, node: GraphNode) {
        match self.inner.id_index.get(&node.id) {
            Some(&idx) => self.inner.topology[idx] = node,
            None => {
                let id = node.id.clone();
                let idx = self.inner.topology.add_node(node);
                self.inner.id_index.insert(id, idx);
            }
        }
    }

    /// Add an edge asserted by `unit` if both endpoints exist; duplicate
    /// (source, target, kind) triples merge into one. Returns whether the
    /// endpoints were present.
    pub fn add_edge(&mut self, from: &NodeId, to: &NodeId, kind: EdgeKind, unit: &str) -> bool {
        let (Some(&f), Some(&t)) = (
            self.inner.id_index.get(from),
            self.inner.id_index.get(to),
        ) else {
            return false;
        };
        let exists = self
            .inner
            .topology
            .edges_connecting(f, t)
            .any(|e| e.weight().kind == kind);
        if !exists {
            self.inner.topology.add_edge(f, t, GraphEdge::new(kind, unit));
        }
        true
    }

    pub fn add_pending(&mut self, pending: PendingRef) {
        self.inner.pending.insert(pending);
    }

    pub fn take_pending(&mut self) -> BTreeSet<PendingRef> {
        std::mem::take(&mut self.inner.pending)
    }

    pub fn record_unit(&mut self, descriptor: UnitDescriptor, mut nodes: Vec<NodeId>) {
        nodes.sort();
        self.inner.units.insert(
            descriptor.qualified_name.clone(),
            UnitEntry { descriptor, nodes },
        );
    }

    /// Retract everything a unit owns: its nodes, the edges it asserted, and
    /// its pending refs. Edges asserted by surviving units demote back to
    /// pending so the assertion can re-resolve if the endpoint returns; the
    /// unit's own assertions vanish with it.
    pub fn retract_unit(&mut self, unit: &str) {
        let Some(entry) = self.inner.units.remove(unit) else {
            return;
        };
        for id in &entry.nodes {
            let Some(&idx) = self.inner.id_index.get(id) else {
                continue;
            };
            let mut demoted = Vec::new();
            for direction in [Direction::Incoming, Direction::Outgoing] {
                for edge in self.inner.topology.edges_directed(idx, direction) {
                    let weight = edge.weight();
                    if weight.unit != unit {
                        demoted.push(PendingRef {
                            source_unit: weight.unit.clone(),
                            source: self.inner.topology[edge.source()].id.clone(),
                            target: self.inner.topology[edge.target()].id.clone(),
                            kind: weight.kind,
                            tentative: weight.kind == EdgeKind::Overrides,
                        });
                    }
                }
            }
            self.inner.pending.extend(demoted);
            self.inner.topology.remove_node(idx);
            self.inner.id_index.remove(id);
        }
        self.inner.pending.retain(|p| p.source_unit != unit);
    }

    pub fn build(self) -> SnapshotGraph {
        self.inner
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
