//! Persistence of annotation records.
//!
//! One record is kept per opened document, keyed by a fingerprint of the
//! document's file name and size.

mod autosave;
mod memory;
mod record;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use autosave::{
    AutoSaveManager,
    DynAutoSaveManager,
    PlatformAutoSaveManager,
    SaveTarget,
    create_autosave_manager,
    DEFAULT_AUTOSAVE_DEBOUNCE_MS,
};
pub use memory::MemoryStorage;
pub use record::{AnnotationRecord, DocumentFingerprint, RECORD_VERSION};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

pub use crate::BoxFuture;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage quota exceeded: {needed} bytes needed, {budget} available")]
    QuotaExceeded { needed: usize, budget: usize },
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for annotation record storage backends.
///
/// Implementations can keep records in memory (session scope) or on disk.
pub trait Storage: Send + Sync {
    /// Save a record under `key`.
    fn save(&self, key: &str, record: &AnnotationRecord) -> BoxFuture<'_, StorageResult<()>>;

    /// Load the record stored under `key`.
    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<AnnotationRecord>>;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all record keys.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a record exists.
    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>>;
}
