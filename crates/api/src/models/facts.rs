use super::graph::NodeKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Use-site kind of an outward symbolic reference.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub enum RefKind {
    Extends,
    Implements,
    Calls,
    ReadsField,
    WritesField,
    ReferencesType,
    Throws,
    AnnotatedBy,
    Instantiates,
}

/// One outward symbolic reference, exactly as embedded in the binary.
///
/// `name`/`descriptor` are present for member references (calls, field
/// accesses) and absent for plain type references.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct SymbolRef {
    pub kind: RefKind,
    /// Referenced type, binary name with dots.
    pub class: String,
    pub name: Option<String>,
    pub descriptor: Option<String>,
}

impl SymbolRef {
    pub fn to_type(kind: RefKind, class: impl Into<String>) -> Self {
        Self {
            kind,
            class: class.into(),
            name: None,
            descriptor: None,
        }
    }

    pub fn to_member(
        kind: RefKind,
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            class: class.into(),
            name: Some(name.into()),
            descriptor: Some(descriptor.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Method,
    Constructor,
    Field,
}

/// Facts about one declared member (method or field).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct MemberFacts {
    pub kind: MemberKind,
    pub name: String,
    /// JVM descriptor; for fields the field descriptor, for methods the
    /// method descriptor.
    pub descriptor: String,
    pub synthetic: bool,
    pub bridge: bool,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    pub refs: Vec<SymbolRef>,
}

/// The unit-local output of structural analysis: the declared type, its
/// members, and every outward reference.
///
/// Produced once per unit per run, never mutated after emission, and
/// independent of any other unit having been analyzed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct UnitFacts {
    /// Binary name with dots, as declared in the classfile.
    pub qualified_name: String,
    pub kind: NodeKind,
    pub synthetic: bool,
    pub modifiers: Vec<String>,
    pub annotations: Vec<String>,
    /// Enclosing type for nested/inner/anonymous classes, from the binary
    /// name (`Outer$Inner` -> `Outer`).
    pub enclosing: Option<String>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    /// Type-level references (supertypes, annotations on the type).
    pub refs: Vec<SymbolRef>,
    pub members: Vec<MemberFacts>,
}

impl UnitFacts {
    /// Simple (unqualified) display name of the type.
    pub fn simple_name(&self) -> &str {
        let tail = self
            .qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name);
        tail.rsplit('$').next().unwrap_or(tail)
    }
}
