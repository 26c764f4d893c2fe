use crate::error::{ApiError, ApiResult};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Deterministic identifier of a graph node.
///
/// Identifiers are derived from the declaration itself, never from processing
/// order, so re-indexing an unchanged unit reproduces the same id byte for
/// byte:
///
/// - types: the binary name with dots, e.g. `com.example.A` or
///   `com.example.A$Inner`
/// - methods: `<type>#<name><descriptor>`, e.g. `com.example.A#run()V`
/// - fields: `<type>#<name>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn class(qualified_name: &str) -> Self {
        Self(Arc::from(qualified_name))
    }

    pub fn method(class: &str, name: &str, descriptor: &str) -> Self {
        Self(Arc::from(format!("{class}#{name}{descriptor}").as_str()))
    }

    pub fn field(class: &str, name: &str) -> Self {
        Self(Arc::from(format!("{class}#{name}").as_str()))
    }

    /// Validate a caller-supplied id string.
    pub fn parse(raw: &str) -> ApiResult<Self> {
        if raw.is_empty() {
            return Err(ApiError::InvalidArgument("empty node id".to_string()));
        }
        if raw.chars().filter(|&c| c == '#').count() > 1 {
            return Err(ApiError::InvalidArgument(format!(
                "malformed node id: {raw}"
            )));
        }
        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The type portion of the id. For a type id this is the id itself.
    pub fn owner(&self) -> &str {
        match self.0.find('#') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    pub fn is_member(&self) -> bool {
        self.0.contains('#')
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self(Arc::from(s.as_str())))
    }
}

impl JsonSchema for NodeId {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("NodeId")
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}
