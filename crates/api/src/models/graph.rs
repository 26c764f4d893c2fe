use super::id::NodeId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
    Method,
    Constructor,
    Field,
}

impl NodeKind {
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Interface
                | NodeKind::Enum
                | NodeKind::Annotation
                | NodeKind::Record
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Enum => "enum",
            NodeKind::Annotation => "annotation",
            NodeKind::Record => "record",
            NodeKind::Method => "method",
            NodeKind::Constructor => "constructor",
            NodeKind::Field => "field",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub enum EdgeKind {
    Extends,
    Implements,
    Overrides,
    Calls,
    ReferencesType,
    ReadsField,
    WritesField,
    Throws,
    Contains,
}

/// A resolved reference in the graph.
///
/// `unit` names the unit whose analysis asserted the edge. That is usually
/// the unit owning the source node, but not always: containment of a nested
/// type is asserted by the nested unit while the source node belongs to the
/// enclosing one. Retraction follows this attribute, so an assertion
/// outlives the other endpoint's unit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub unit: String,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind, unit: impl Into<String>) -> Self {
        Self {
            kind,
            unit: unit.into(),
        }
    }
}

/// A node of the persisted graph.
///
/// Every node carries the qualified name and fingerprint of the unit that
/// declared it; retraction is driven by this ownership, never inferred from
/// graph shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub unit: String,
    pub unit_fingerprint: u64,
    /// Compiler-generated (synthetic or bridge) declaration.
    pub synthetic: bool,
    pub modifiers: Vec<String>,
    /// Qualified names of annotation types present on the declaration.
    pub annotations: Vec<String>,
}

/// A reference whose target node is not (yet) part of the graph.
///
/// Pending refs are owned by their source unit, survive reconciliation, and
/// are re-attempted for resolution on every run. They are invisible to
/// traversal but countable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct PendingRef {
    pub source_unit: String,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Set for OVERRIDES refs deferred because an ancestor type was
    /// unresolved; the supertype chain walk is redone on later runs.
    pub tentative: bool,
}

/// A directed edge returned from a query, with both endpoints spelled out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct QueryResultEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// The result of a query execution, representing a subgraph.
#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema)]
pub struct QueryResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<QueryResultEdge>,
}

impl QueryResult {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<QueryResultEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Traversal direction relative to the start node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}
