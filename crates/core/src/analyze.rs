//! Parallel structural analysis of scanned units.

use crate::model::{RunError, RunErrorKind, UnitDescriptor, UnitFacts};
use crate::scan::read_unit_bytes;
use rayon::prelude::*;

pub struct AnalysisOutcome {
    /// Successfully analyzed units, in scan order.
    pub analyzed: Vec<(UnitDescriptor, UnitFacts)>,
    pub errors: Vec<RunError>,
}

/// Analyze every unit independently. A unit that fails to parse is recorded
/// as an error and dropped; it never aborts the run.
pub fn analyze_units(units: Vec<UnitDescriptor>) -> AnalysisOutcome {
    let results: Vec<Result<(UnitDescriptor, UnitFacts), RunError>> = units
        .into_par_iter()
        .map(|unit| {
            let bytes = read_unit_bytes(&unit.origin).map_err(|err| {
                RunError::new(
                    RunErrorKind::Analysis,
                    unit.qualified_name.clone(),
                    err.to_string(),
                )
            })?;
            let facts = jarscope_classfile::analyze(&bytes).map_err(|err| {
                RunError::new(
                    RunErrorKind::Analysis,
                    unit.qualified_name.clone(),
                    err.to_string(),
                )
            })?;
            if facts.qualified_name != unit.qualified_name {
                tracing::warn!(
                    scanned = %unit.qualified_name,
                    declared = %facts.qualified_name,
                    "unit declares a different name than its location suggests"
                );
            }
            Ok((unit, facts))
        })
        .collect();

    let mut analyzed = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(pair) => analyzed.push(pair),
            Err(err) => errors.push(err),
        }
    }
    tracing::info!(
        analyzed = analyzed.len(),
        failed = errors.len(),
        "structural analysis complete"
    );
    AnalysisOutcome { analyzed, errors }
}
