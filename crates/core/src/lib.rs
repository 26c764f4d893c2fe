pub mod error;
pub mod logging;

pub mod build;
pub mod model;
pub mod persist;
pub mod query;
pub mod runtime;
pub mod scan;
pub mod store;

mod analyze;

pub use error::{IndexError, Result};
pub use model::SnapshotGraph;
pub use runtime::IndexEngine;
