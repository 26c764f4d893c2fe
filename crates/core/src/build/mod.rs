//! Graph construction: fact sets plus the prior snapshot in, a delta out.
//!
//! The builder never mutates a snapshot. It resolves every symbolic
//! reference against the current run first and the retained part of the
//! prior snapshot second, and records everything else as a pending ref
//! owned by its source unit. Output ordering is canonical (sorted sets),
//! so identical inputs produce byte-identical deltas.

use crate::model::{
    EdgeKind, GraphNode, MemberFacts, MemberKind, NodeId, NodeKind, PendingRef, RefKind, RunError,
    RunErrorKind, SnapshotGraph, SymbolRef, UnitDescriptor, UnitFacts,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// What one run wants the snapshot to become, relative to the prior one.
/// Each edge carries the qualified name of the unit asserting it.
pub struct GraphDelta {
    pub nodes: Vec<GraphNode>,
    pub edges: BTreeSet<(NodeId, NodeId, EdgeKind, String)>,
    pub pending: BTreeSet<PendingRef>,
    pub units: Vec<(UnitDescriptor, Vec<NodeId>)>,
    pub errors: Vec<RunError>,
}

/// Per-type view of the current run, used for override resolution.
struct TypeInfo {
    super_class: Option<String>,
    interfaces: Vec<String>,
    /// (name, descriptor) of methods eligible as override targets.
    virtual_methods: BTreeSet<(String, String)>,
}

pub struct GraphBuilder<'a> {
    prior: &'a SnapshotGraph,
    /// Units being removed or replaced this run; their prior nodes are not
    /// valid resolution targets.
    stale: &'a BTreeSet<String>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(prior: &'a SnapshotGraph, stale: &'a BTreeSet<String>) -> Self {
        Self { prior, stale }
    }

    pub fn build(&self, analyzed: Vec<(UnitDescriptor, UnitFacts)>) -> GraphDelta {
        let mut errors = Vec::new();

        // Two units declaring the same type: first in scan order wins.
        let mut accepted: Vec<(UnitDescriptor, UnitFacts)> = Vec::with_capacity(analyzed.len());
        let mut declared = BTreeSet::new();
        for (unit, facts) in analyzed {
            if declared.insert(facts.qualified_name.clone()) {
                accepted.push((unit, facts));
            } else {
                errors.push(RunError::new(
                    RunErrorKind::Duplicate,
                    facts.qualified_name.clone(),
                    format!("already declared; ignoring copy from {:?}", unit.origin.artifact()),
                ));
            }
        }

        let types: BTreeMap<String, TypeInfo> = accepted
            .iter()
            .map(|(_, facts)| (facts.qualified_name.clone(), type_info(facts)))
            .collect();

        let mut nodes = Vec::new();
        let mut current_ids = BTreeSet::new();
        let mut units = Vec::with_capacity(accepted.len());
        for (unit, facts) in &accepted {
            let mut owned = Vec::with_capacity(facts.members.len() + 1);
            for node in unit_nodes(unit, facts) {
                owned.push(node.id.clone());
                current_ids.insert(node.id.clone());
                nodes.push(node);
            }
            units.push((unit.clone(), owned));
        }

        let mut edges = BTreeSet::new();
        let mut pending = BTreeSet::new();
        for (unit, facts) in &accepted {
            self.emit_unit_edges(unit, facts, &types, &current_ids, &mut edges, &mut pending);
        }

        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            pending = pending.len(),
            "graph delta built"
        );
        GraphDelta {
            nodes,
            edges,
            pending,
            units,
            errors,
        }
    }

    /// A node id is a valid edge target if the current run produces it or if
    /// the prior snapshot has it under a unit this run is not replacing.
    fn resolvable(&self, current: &BTreeSet<NodeId>, target: &NodeId) -> bool {
        if current.contains(target) {
            return true;
        }
        match self.prior.get(target) {
            Some(node) => !self.stale.contains(&node.unit),
            None => false,
        }
    }

    fn emit_unit_edges(
        &self,
        unit: &UnitDescriptor,
        facts: &UnitFacts,
        types: &BTreeMap<String, TypeInfo>,
        current: &BTreeSet<NodeId>,
        edges: &mut BTreeSet<(NodeId, NodeId, EdgeKind, String)>,
        pending: &mut BTreeSet<PendingRef>,
    ) {
        let type_id = NodeId::class(&facts.qualified_name);

        // Member containment is always intra-unit and always resolves.
        for member in &facts.members {
            edges.insert((
                type_id.clone(),
                member_id(&facts.qualified_name, member),
                EdgeKind::Contains,
                unit.qualified_name.clone(),
            ));
        }
        // The nested unit asserts its enclosing type's containment edge, so
        // the unresolved endpoint here is the source, not the target.
        if let Some(enclosing) = &facts.enclosing {
            let enclosing_id = NodeId::class(enclosing);
            if self.resolvable(current, &enclosing_id) {
                edges.insert((
                    enclosing_id,
                    type_id.clone(),
                    EdgeKind::Contains,
                    unit.qualified_name.clone(),
                ));
            } else {
                pending.insert(PendingRef {
                    source_unit: unit.qualified_name.clone(),
                    source: enclosing_id,
                    target: type_id.clone(),
                    kind: EdgeKind::Contains,
                    tentative: false,
                });
            }
        }

        for reference in &facts.refs {
            self.emit_ref(unit, &facts.qualified_name, &type_id, reference, current, edges, pending);
        }
        for member in &facts.members {
            let source = member_id(&facts.qualified_name, member);
            for reference in &member.refs {
                self.emit_ref(unit, &facts.qualified_name, &source, reference, current, edges, pending);
            }
            if overridable(member) {
                self.emit_override(unit, facts, member, &source, types, current, edges, pending);
            }
        }
    }

    fn emit_ref(
        &self,
        unit: &UnitDescriptor,
        declaring_type: &str,
        source: &NodeId,
        reference: &SymbolRef,
        current: &BTreeSet<NodeId>,
        edges: &mut BTreeSet<(NodeId, NodeId, EdgeKind, String)>,
        pending: &mut BTreeSet<PendingRef>,
    ) {
        let (target, kind) = match edge_of_ref(reference) {
            Some(pair) => pair,
            None => return,
        };
        // Self type references carry no information.
        if kind == EdgeKind::ReferencesType && target.as_str() == declaring_type {
            return;
        }
        self.emit(unit, source.clone(), target, kind, current, edges, pending);
    }

    fn emit(
        &self,
        unit: &UnitDescriptor,
        source: NodeId,
        target: NodeId,
        kind: EdgeKind,
        current: &BTreeSet<NodeId>,
        edges: &mut BTreeSet<(NodeId, NodeId, EdgeKind, String)>,
        pending: &mut BTreeSet<PendingRef>,
    ) {
        if self.resolvable(current, &target) {
            edges.insert((source, target, kind, unit.qualified_name.clone()));
        } else {
            pending.insert(PendingRef {
                source_unit: unit.qualified_name.clone(),
                source,
                target,
                kind,
                tentative: false,
            });
        }
    }

    /// Walk the supertype chain looking for the nearest declaration this
    /// method overrides. The whole known part of the chain is explored
    /// first; only when no declaration is found there does an unindexed
    /// ancestor leave a tentative pending ref, redone once it is indexed.
    fn emit_override(
        &self,
        unit: &UnitDescriptor,
        facts: &UnitFacts,
        member: &MemberFacts,
        source: &NodeId,
        types: &BTreeMap<String, TypeInfo>,
        current: &BTreeSet<NodeId>,
        edges: &mut BTreeSet<(NodeId, NodeId, EdgeKind, String)>,
        pending: &mut BTreeSet<PendingRef>,
    ) {
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut visited = BTreeSet::new();
        let mut first_unknown: Option<String> = None;
        queue.extend(facts.super_class.iter().cloned());
        queue.extend(facts.interfaces.iter().cloned());

        while let Some(ancestor) = queue.pop_front() {
            if !visited.insert(ancestor.clone()) {
                continue;
            }
            if let Some(info) = types.get(&ancestor) {
                if info
                    .virtual_methods
                    .contains(&(member.name.clone(), member.descriptor.clone()))
                {
                    edges.insert((
                        source.clone(),
                        NodeId::method(&ancestor, &member.name, &member.descriptor),
                        EdgeKind::Overrides,
                        unit.qualified_name.clone(),
                    ));
                    return;
                }
                queue.extend(info.super_class.iter().cloned());
                queue.extend(info.interfaces.iter().cloned());
            } else if self.retained_type(&ancestor) {
                let candidate = NodeId::method(&ancestor, &member.name, &member.descriptor);
                if self.resolvable(current, &candidate) {
                    edges.insert((
                        source.clone(),
                        candidate,
                        EdgeKind::Overrides,
                        unit.qualified_name.clone(),
                    ));
                    return;
                }
                queue.extend(self.prior.supertypes_of(&ancestor));
            } else if first_unknown.is_none() {
                first_unknown = Some(ancestor);
            }
        }

        if let Some(ancestor) = first_unknown {
            pending.insert(PendingRef {
                source_unit: unit.qualified_name.clone(),
                source: source.clone(),
                target: NodeId::method(&ancestor, &member.name, &member.descriptor),
                kind: EdgeKind::Overrides,
                tentative: true,
            });
        }
    }

    /// Whether the prior snapshot retains a type node for `name` this run.
    fn retained_type(&self, name: &str) -> bool {
        match self.prior.get(&NodeId::class(name)) {
            Some(node) => node.kind.is_type() && !self.stale.contains(&node.unit),
            None => false,
        }
    }
}

fn type_info(facts: &UnitFacts) -> TypeInfo {
    TypeInfo {
        super_class: facts.super_class.clone(),
        interfaces: facts.interfaces.clone(),
        virtual_methods: facts
            .members
            .iter()
            .filter(|m| overridable(m))
            .map(|m| (m.name.clone(), m.descriptor.clone()))
            .collect(),
    }
}

fn overridable(member: &MemberFacts) -> bool {
    member.kind == MemberKind::Method
        && !member.modifiers.iter().any(|m| m == "static" || m == "private")
}

fn member_id(declaring_type: &str, member: &MemberFacts) -> NodeId {
    match member.kind {
        MemberKind::Method | MemberKind::Constructor => {
            NodeId::method(declaring_type, &member.name, &member.descriptor)
        }
        MemberKind::Field => NodeId::field(declaring_type, &member.name),
    }
}

fn node_kind_of(member: &MemberFacts) -> NodeKind {
    match member.kind {
        MemberKind::Method => NodeKind::Method,
        MemberKind::Constructor => NodeKind::Constructor,
        MemberKind::Field => NodeKind::Field,
    }
}

fn unit_nodes(unit: &UnitDescriptor, facts: &UnitFacts) -> Vec<GraphNode> {
    let mut nodes = Vec::with_capacity(facts.members.len() + 1);
    nodes.push(GraphNode {
        id: NodeId::class(&facts.qualified_name),
        name: facts.simple_name().to_string(),
        kind: facts.kind,
        unit: unit.qualified_name.clone(),
        unit_fingerprint: unit.fingerprint,
        synthetic: facts.synthetic,
        modifiers: facts.modifiers.clone(),
        annotations: facts.annotations.clone(),
    });
    for member in &facts.members {
        nodes.push(GraphNode {
            id: member_id(&facts.qualified_name, member),
            name: member.name.clone(),
            kind: node_kind_of(member),
            unit: unit.qualified_name.clone(),
            unit_fingerprint: unit.fingerprint,
            synthetic: member.synthetic || member.bridge,
            modifiers: member.modifiers.clone(),
            annotations: member.annotations.clone(),
        });
    }
    nodes
}

/// Map a use-site reference onto a graph edge target and kind.
fn edge_of_ref(reference: &SymbolRef) -> Option<(NodeId, EdgeKind)> {
    let target_member = || {
        let name = reference.name.as_deref()?;
        match reference.kind {
            RefKind::Calls => {
                let descriptor = reference.descriptor.as_deref()?;
                Some(NodeId::method(&reference.class, name, descriptor))
            }
            _ => Some(NodeId::field(&reference.class, name)),
        }
    };
    match reference.kind {
        RefKind::Extends => Some((NodeId::class(&reference.class), EdgeKind::Extends)),
        RefKind::Implements => Some((NodeId::class(&reference.class), EdgeKind::Implements)),
        RefKind::Throws => Some((NodeId::class(&reference.class), EdgeKind::Throws)),
        RefKind::ReferencesType | RefKind::AnnotatedBy | RefKind::Instantiates => {
            Some((NodeId::class(&reference.class), EdgeKind::ReferencesType))
        }
        RefKind::Calls => Some((target_member()?, EdgeKind::Calls)),
        RefKind::ReadsField => Some((target_member()?, EdgeKind::ReadsField)),
        RefKind::WritesField => Some((target_member()?, EdgeKind::WritesField)),
    }
}
