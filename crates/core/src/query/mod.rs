//! Read-side API over an immutable snapshot.
//!
//! Every query borrows one snapshot, so results are internally consistent
//! even while a new run is being reconciled. Unknown start nodes yield
//! empty results, never errors. Node lists are sorted by id and edge lists
//! by (from, to, kind), so repeated queries line up byte for byte.

use crate::model::{
    Direction, EdgeKind, GraphNode, NodeId, NodeKind, PendingRef, QueryResult, QueryResultEdge,
    SnapshotGraph,
};
use petgraph::Direction as PetDirection;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub struct QueryEngine<'a> {
    graph: &'a SnapshotGraph,
}

impl<'a> QueryEngine<'a> {
    pub fn new(graph: &'a SnapshotGraph) -> Self {
        Self { graph }
    }

    pub fn lookup(&self, id: &NodeId) -> Option<&'a GraphNode> {
        self.graph.get(id)
    }

    /// Direct neighbors of `id` along edges of the given kinds (all kinds
    /// when `kinds` is `None`).
    pub fn neighbors(
        &self,
        id: &NodeId,
        direction: Direction,
        kinds: Option<&[EdgeKind]>,
    ) -> QueryResult {
        self.traverse(id, direction, kinds, Some(1), None)
    }

    /// Everything reachable from `id` within `max_depth` hops (unbounded
    /// when `None`), breadth-first. The start node is not part of the
    /// result.
    pub fn reachable(
        &self,
        id: &NodeId,
        direction: Direction,
        kinds: Option<&[EdgeKind]>,
        max_depth: Option<usize>,
    ) -> QueryResult {
        self.traverse(id, direction, kinds, max_depth, None)
    }

    /// Nodes with an edge of `kind` (any kind when `None`) pointing at `id`.
    pub fn referrers(&self, id: &NodeId, kind: Option<EdgeKind>) -> QueryResult {
        let kinds = kind.map(|k| vec![k]);
        self.traverse(id, Direction::Incoming, kinds.as_deref(), Some(1), None)
    }

    /// Direct callers of `method`, capped at `limit`.
    pub fn callers_of(&self, method: &NodeId, limit: Option<usize>) -> QueryResult {
        self.traverse(
            method,
            Direction::Incoming,
            Some(&[EdgeKind::Calls]),
            Some(1),
            limit,
        )
    }

    /// Types directly implementing the interface `id`.
    pub fn implementations_of(&self, id: &NodeId) -> QueryResult {
        self.traverse(
            id,
            Direction::Incoming,
            Some(&[EdgeKind::Implements]),
            Some(1),
            None,
        )
    }

    /// Subclasses of `id`, transitively up to `max_depth` levels.
    pub fn subclasses_of(&self, id: &NodeId, max_depth: Option<usize>) -> QueryResult {
        self.traverse(
            id,
            Direction::Incoming,
            Some(&[EdgeKind::Extends]),
            max_depth,
            None,
        )
    }

    /// Nodes declared with the given annotation type, optionally narrowed
    /// to one node kind.
    pub fn annotated_with(
        &self,
        annotation: &str,
        kind: Option<NodeKind>,
    ) -> Vec<&'a GraphNode> {
        self.graph
            .nodes()
            .filter(|node| kind.is_none_or(|k| node.kind == k))
            .filter(|node| node.annotations.iter().any(|a| a == annotation))
            .collect()
    }

    /// Pending refs, optionally restricted to one source unit.
    pub fn unresolved_refs(&self, source_unit: Option<&str>) -> Vec<&'a PendingRef> {
        self.graph
            .pending()
            .iter()
            .filter(|p| source_unit.is_none_or(|unit| p.source_unit == unit))
            .collect()
    }

    /// Pending refs asserted by one node.
    pub fn unresolved_from(&self, source: &NodeId) -> Vec<&'a PendingRef> {
        self.graph.pending_from(source)
    }

    fn traverse(
        &self,
        start: &NodeId,
        direction: Direction,
        kinds: Option<&[EdgeKind]>,
        max_depth: Option<usize>,
        node_limit: Option<usize>,
    ) -> QueryResult {
        let start_index = match self.graph.find_index(start) {
            Some(index) => index,
            None => return QueryResult::empty(),
        };
        let petgraph_direction = match direction {
            Direction::Outgoing => PetDirection::Outgoing,
            Direction::Incoming => PetDirection::Incoming,
        };
        let admits = |kind: EdgeKind| kinds.is_none_or(|ks| ks.contains(&kind));
        let topology = self.graph.topology();

        let mut visited: BTreeSet<NodeIndex> = BTreeSet::new();
        visited.insert(start_index);
        let mut found: BTreeMap<NodeId, &GraphNode> = BTreeMap::new();
        let mut edges: BTreeSet<(NodeId, NodeId, EdgeKind)> = BTreeSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        queue.push_back((start_index, 0));

        'bfs: while let Some((index, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for edge in topology.edges_directed(index, petgraph_direction) {
                let kind = edge.weight().kind;
                if !admits(kind) {
                    continue;
                }
                let next = match petgraph_direction {
                    PetDirection::Outgoing => edge.target(),
                    PetDirection::Incoming => edge.source(),
                };
                if !visited.contains(&next) {
                    if node_limit.is_some_and(|limit| found.len() >= limit) {
                        break 'bfs;
                    }
                    visited.insert(next);
                    let node = &topology[next];
                    found.insert(node.id.clone(), node);
                    queue.push_back((next, depth + 1));
                }
                let (from, to) = (&topology[edge.source()], &topology[edge.target()]);
                edges.insert((from.id.clone(), to.id.clone(), kind));
            }
        }

        QueryResult::new(
            found.into_values().cloned().collect(),
            edges
                .into_iter()
                .map(|(from, to, kind)| QueryResultEdge { from, to, kind })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, UnitDescriptor, UnitOrigin};
    use std::path::PathBuf;

    fn node(id: NodeId, kind: NodeKind, unit: &str, annotations: Vec<String>) -> GraphNode {
        GraphNode {
            name: id.as_str().rsplit(['.', '#']).next().unwrap_or_default().to_string(),
            id,
            kind,
            unit: unit.to_string(),
            unit_fingerprint: 1,
            synthetic: false,
            modifiers: Vec::new(),
            annotations,
        }
    }

    fn descriptor(name: &str) -> UnitDescriptor {
        UnitDescriptor {
            qualified_name: name.to_string(),
            origin: UnitOrigin::ClassFile {
                path: PathBuf::from("/x"),
            },
            fingerprint: 1,
        }
    }

    /// Base <- Mid <- Leaf (EXTENDS), plus Mid.run CALLS Base.run.
    fn hierarchy() -> SnapshotGraph {
        let mut builder = SnapshotGraph::empty().to_builder();
        let base = NodeId::class("com.example.Base");
        let mid = NodeId::class("com.example.Mid");
        let leaf = NodeId::class("com.example.Leaf");
        let base_run = NodeId::method("com.example.Base", "run", "()V");
        let mid_run = NodeId::method("com.example.Mid", "run", "()V");

        for (id, unit, annotations) in [
            (base.clone(), "com.example.Base", vec!["com.example.Marker".to_string()]),
            (mid.clone(), "com.example.Mid", Vec::new()),
            (leaf.clone(), "com.example.Leaf", Vec::new()),
        ] {
            builder.upsert_node(node(id.clone(), NodeKind::Class, unit, annotations));
            builder.record_unit(descriptor(unit), vec![id]);
        }
        builder.upsert_node(node(base_run.clone(), NodeKind::Method, "com.example.Base", Vec::new()));
        builder.upsert_node(node(mid_run.clone(), NodeKind::Method, "com.example.Mid", Vec::new()));

        assert!(builder.add_edge(&mid, &base, EdgeKind::Extends, "com.example.Mid"));
        assert!(builder.add_edge(&leaf, &mid, EdgeKind::Extends, "com.example.Leaf"));
        assert!(builder.add_edge(&base, &base_run, EdgeKind::Contains, "com.example.Base"));
        assert!(builder.add_edge(&mid, &mid_run, EdgeKind::Contains, "com.example.Mid"));
        assert!(builder.add_edge(&mid_run, &base_run, EdgeKind::Calls, "com.example.Mid"));
        builder.build()
    }

    #[test]
    fn subclasses_respect_the_depth_bound() {
        let graph = hierarchy();
        let engine = QueryEngine::new(&graph);
        let base = NodeId::class("com.example.Base");

        let direct = engine.subclasses_of(&base, Some(1));
        assert_eq!(direct.nodes.len(), 1);
        assert_eq!(direct.nodes[0].id, NodeId::class("com.example.Mid"));

        let all = engine.subclasses_of(&base, None);
        let ids: Vec<_> = all.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["com.example.Leaf", "com.example.Mid"]);
    }

    #[test]
    fn callers_are_found_across_the_calls_edge_only() {
        let graph = hierarchy();
        let engine = QueryEngine::new(&graph);
        let target = NodeId::method("com.example.Base", "run", "()V");

        let callers = engine.callers_of(&target, None);
        assert_eq!(callers.nodes.len(), 1);
        assert_eq!(callers.nodes[0].id, NodeId::method("com.example.Mid", "run", "()V"));

        assert!(engine.callers_of(&NodeId::class("absent.T"), None).is_empty());
    }

    #[test]
    fn annotated_with_matches_declared_annotations() {
        let graph = hierarchy();
        let engine = QueryEngine::new(&graph);
        let hits = engine.annotated_with("com.example.Marker", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, NodeId::class("com.example.Base"));
        assert!(
            engine
                .annotated_with("com.example.Marker", Some(NodeKind::Method))
                .is_empty()
        );
        assert!(engine.annotated_with("com.example.Absent", None).is_empty());
    }

    #[test]
    fn neighbors_filter_by_edge_kind() {
        let graph = hierarchy();
        let engine = QueryEngine::new(&graph);
        let mid = NodeId::class("com.example.Mid");

        let contains = engine.neighbors(&mid, Direction::Outgoing, Some(&[EdgeKind::Contains]));
        assert_eq!(contains.nodes.len(), 1);
        assert_eq!(
            contains.nodes[0].id,
            NodeId::method("com.example.Mid", "run", "()V")
        );

        let everything = engine.neighbors(&mid, Direction::Outgoing, None);
        assert_eq!(everything.nodes.len(), 2);
    }
}
