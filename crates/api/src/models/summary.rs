use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which phase recorded a per-unit failure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunErrorKind {
    /// Unreadable root or archive entry; skipped.
    Scan,
    /// Malformed or unreadable unit; skipped.
    Analysis,
    /// Two units declared the same qualified name; first one won.
    Duplicate,
}

/// A recorded, non-fatal failure. The core performs no user-facing
/// formatting; front ends render these as they see fit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct RunError {
    pub kind: RunErrorKind,
    /// The root, artifact, or unit the failure is about.
    pub subject: String,
    pub message: String,
}

impl RunError {
    pub fn new(kind: RunErrorKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one indexing run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct RunSummary {
    pub units_scanned: usize,
    /// Units actually analyzed this run (changed or new fingerprints).
    pub units_analyzed: usize,
    pub units_failed: usize,
    /// Units present in the prior snapshot but gone from the scan.
    pub units_removed: usize,
    pub nodes_upserted: usize,
    pub edges_upserted: usize,
    /// Unresolved references outstanding after reconciliation.
    pub pending_refs: usize,
    pub errors: Vec<RunError>,
}

impl RunSummary {
    pub fn record(&mut self, error: RunError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
