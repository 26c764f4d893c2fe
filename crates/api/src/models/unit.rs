use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a unit's bytes live on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub enum UnitOrigin {
    /// A loose `.class` file under a directory root.
    ClassFile { path: PathBuf },
    /// An entry inside a JAR archive.
    JarEntry { archive: PathBuf, entry: String },
}

impl UnitOrigin {
    /// The artifact the unit came from: the class file itself, or the JAR.
    pub fn artifact(&self) -> &PathBuf {
        match self {
            UnitOrigin::ClassFile { path } => path,
            UnitOrigin::JarEntry { archive, .. } => archive,
        }
    }
}

/// One binary compilation unit discovered by the scanner.
///
/// Immutable for the run; the fingerprint decides whether the unit needs
/// re-analysis against the prior snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct UnitDescriptor {
    /// Binary name with dots, derived from the entry path
    /// (e.g. `com.example.A`, nested `com.example.A$Inner`).
    pub qualified_name: String,
    pub origin: UnitOrigin,
    /// xxh3 hash of the unit's bytes.
    pub fingerprint: u64,
}
