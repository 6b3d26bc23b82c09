//! Checkpoint stores: snapshot a board, hand back an opaque reference.
//!
//! The controller calls [`CheckpointStore::put`] every checkpoint interval
//! and the successor instance calls [`CheckpointStore::get`] followed by
//! [`CheckpointStore::discard`]. Any failure here is fatal to the run:
//! without a known-good board the controller cannot continue.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use eternal_types::{Board, CheckpointRef};

/// Errors raised by a checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// No snapshot is stored under the reference.
    #[error("checkpoint not found: {0}")]
    NotFound(CheckpointRef),

    /// The backing store could not be reached or written.
    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),

    /// A snapshot exists but cannot be decoded.
    #[error("checkpoint {reference} is corrupt: {reason}")]
    Corrupt {
        /// The unreadable reference.
        reference: CheckpointRef,
        /// Decoder message.
        reason: String,
    },
}

/// Key-value storage for full board snapshots.
pub trait CheckpointStore: Send + Sync {
    /// Store a snapshot and return a fresh reference to it.
    fn put(&self, board: &Board) -> Result<CheckpointRef, CheckpointError>;

    /// Retrieve a previously stored snapshot.
    fn get(&self, reference: CheckpointRef) -> Result<Board, CheckpointError>;

    /// Release a snapshot once its successor has loaded it. Discarding an
    /// unknown reference is not an error.
    fn discard(&self, reference: CheckpointRef) -> Result<(), CheckpointError>;
}

/// Process-local store backed by a guarded map.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    boards: RwLock<HashMap<CheckpointRef, Board>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots currently held.
    pub fn len(&self) -> usize {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn put(&self, board: &Board) -> Result<CheckpointRef, CheckpointError> {
        let reference = CheckpointRef::new();
        self.boards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference, board.clone());
        Ok(reference)
    }

    fn get(&self, reference: CheckpointRef) -> Result<Board, CheckpointError> {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&reference)
            .cloned()
            .ok_or(CheckpointError::NotFound(reference))
    }

    fn discard(&self, reference: CheckpointRef) -> Result<(), CheckpointError> {
        self.boards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&reference);
        Ok(())
    }
}

/// File-backed store: one JSON document per reference in a directory.
///
/// Snapshots survive a process restart. Writes go to a temporary file
/// first and are renamed into place, so a reader never sees a partial
/// snapshot.
#[derive(Debug, Clone)]
pub struct DirectoryCheckpointStore {
    directory: PathBuf,
}

impl DirectoryCheckpointStore {
    /// Open (and create if needed) a checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Unavailable`] if the directory cannot be
    /// created.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            CheckpointError::Unavailable(format!(
                "cannot create {}: {e}",
                directory.display()
            ))
        })?;
        Ok(Self { directory })
    }

    /// The directory holding the snapshots.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, reference: CheckpointRef) -> PathBuf {
        self.directory.join(format!("{reference}.json"))
    }
}

impl CheckpointStore for DirectoryCheckpointStore {
    fn put(&self, board: &Board) -> Result<CheckpointRef, CheckpointError> {
        let reference = CheckpointRef::new();
        let bytes = serde_json::to_vec(board)
            .map_err(|e| CheckpointError::Unavailable(format!("encode failed: {e}")))?;

        let path = self.path_for(reference);
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, bytes)
            .and_then(|()| std::fs::rename(&staging, &path))
            .map_err(|e| {
                CheckpointError::Unavailable(format!("write {} failed: {e}", path.display()))
            })?;

        tracing::debug!(%reference, path = %path.display(), "Stored checkpoint");
        Ok(reference)
    }

    fn get(&self, reference: CheckpointRef) -> Result<Board, CheckpointError> {
        let path = self.path_for(reference);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CheckpointError::NotFound(reference),
            _ => CheckpointError::Unavailable(format!("read {} failed: {e}", path.display())),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
            reference,
            reason: e.to_string(),
        })
    }

    fn discard(&self, reference: CheckpointRef) -> Result<(), CheckpointError> {
        let path = self.path_for(reference);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Unavailable(format!(
                "remove {} failed: {e}",
                path.display()
            ))),
        }
    }
}
