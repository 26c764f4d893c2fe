pub mod graph;
pub mod storage;

pub use graph::{GraphStats, SnapshotBuilder, SnapshotGraph, UnitEntry};
pub use jarscope_api::models::{
    Direction, EdgeKind, GraphEdge, GraphNode, MemberFacts, MemberKind, NodeId, NodeKind,
    PendingRef, QueryResult, QueryResultEdge, RefKind, RunError, RunErrorKind, RunSummary,
    SymbolRef, UnitDescriptor, UnitFacts, UnitOrigin,
};
