use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The scan produced no units at all (e.g. empty classpath). Per-unit
    /// failures never raise this; they are recorded in the run summary.
    #[error("no units found under the given roots")]
    EmptyInput,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The reconciliation commit failed; the prior snapshot is untouched.
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),
    /// Another run is reconciling; retryable by the caller.
    #[error("another indexing run is in progress")]
    ConcurrentRun,
    #[error("indexing run cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
