//! Snapshot storage backends.
//!
//! A store holds exactly one snapshot. `commit` replaces it atomically:
//! readers holding an `Arc` from a previous `load` keep a consistent view,
//! and a crash mid-commit must leave either the old or the new snapshot on
//! disk, never a torn one.

use crate::model::SnapshotGraph;
use crate::model::storage::{from_storage, to_storage};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode failed: {0}")]
    Encode(String),
    #[error("snapshot decode failed: {0}")]
    Decode(String),
    #[error("commit rejected: {0}")]
    Rejected(String),
}

pub trait SnapshotStore: Send + Sync {
    /// The current snapshot. An empty store yields an empty snapshot.
    fn load(&self) -> Result<Arc<SnapshotGraph>, StoreError>;

    /// Atomically replace the current snapshot.
    fn commit(&self, snapshot: Arc<SnapshotGraph>) -> Result<(), StoreError>;
}

/// In-memory store: a single pointer swap.
pub struct MemoryStore {
    current: RwLock<Arc<SnapshotGraph>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SnapshotGraph::empty())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Arc<SnapshotGraph>, StoreError> {
        Ok(self
            .current
            .read()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))?
            .clone())
    }

    fn commit(&self, snapshot: Arc<SnapshotGraph>) -> Result<(), StoreError> {
        *self
            .current
            .write()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))? = snapshot;
        Ok(())
    }
}

const ZSTD_LEVEL: i32 = 3;

/// File-backed store: MessagePack + zstd, written to a sibling temp file
/// and renamed over the target so a partial write never replaces a good
/// snapshot. The decoded snapshot is cached after the first load.
pub struct FileStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<SnapshotGraph>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> Result<SnapshotGraph, StoreError> {
        if !self.path.exists() {
            return Ok(SnapshotGraph::empty());
        }
        let file = File::open(&self.path)?;
        let decoder =
            zstd::stream::Decoder::new(BufReader::new(file)).map_err(StoreError::Io)?;
        let storage = rmp_serde::from_read(decoder)
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        from_storage(storage).map_err(StoreError::Decode)
    }

    fn write_snapshot(&self, snapshot: &SnapshotGraph) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = rmp_serde::to_vec_named(&to_storage(snapshot))
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut encoder = zstd::stream::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)
                .map_err(StoreError::Io)?;
            encoder.write_all(&bytes)?;
            let mut writer = encoder.finish().map_err(StoreError::Io)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "snapshot committed");
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Arc<SnapshotGraph>, StoreError> {
        if let Some(cached) = self
            .cached
            .read()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))?
            .as_ref()
        {
            return Ok(cached.clone());
        }
        let snapshot = Arc::new(self.read_snapshot()?);
        *self
            .cached
            .write()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))? =
            Some(snapshot.clone());
        Ok(snapshot)
    }

    fn commit(&self, snapshot: Arc<SnapshotGraph>) -> Result<(), StoreError> {
        self.write_snapshot(&snapshot)?;
        *self
            .cached
            .write()
            .map_err(|_| StoreError::Rejected("store lock poisoned".into()))? = Some(snapshot);
        Ok(())
    }
}
