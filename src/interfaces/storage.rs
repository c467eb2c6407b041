//! Storage service interface.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::model::StoreKey;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Unknown filesystem: {0}")]
    UnknownFilesystem(StoreKey),

    #[error("Path not found: {store}/{path}")]
    NotFound { store: StoreKey, path: String },

    #[error("Filesystem is read-only: {0}")]
    ReadOnly(StoreKey),

    #[error("Storage service unavailable: {0}")]
    Unavailable(String),
}

/// Which entries a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    File,
    Dir,
    All,
}

/// Response of a batched copy.
///
/// Paths of the request that appear in neither `completed` nor `skipped`
/// failed to transfer; `message` explains why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyResult {
    pub success: bool,
    pub completed: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    pub message: Option<String>,
}

/// Interface to the storage service that physically holds repository content.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// List paths under a filesystem.
    async fn list(&self, store: &StoreKey, recursive: bool, file_type: FileType)
        -> Result<Vec<String>>;

    /// Check whether a single path exists.
    async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool>;

    /// Return the subset of `paths` that are NOT present in the filesystem.
    async fn batch_exists(&self, store: &StoreKey, paths: &[String]) -> Result<BTreeSet<String>>;

    /// Copy `paths` from `source` to `target` in one batch.
    ///
    /// Existing content at the target always wins: identical content is
    /// reported as skipped; different content is skipped unless
    /// `fail_when_exists` is set, in which case that path fails.
    async fn copy(
        &self,
        source: &StoreKey,
        target: &StoreKey,
        paths: &BTreeSet<String>,
        fail_when_exists: bool,
    ) -> Result<CopyResult>;

    /// Delete paths; returns those that could not be deleted.
    async fn delete(&self, store: &StoreKey, paths: &BTreeSet<String>) -> Result<BTreeSet<String>>;

    /// Read a path's content, `None` if absent.
    async fn retrieve(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write a path's content.
    async fn put(&self, store: &StoreKey, path: &str, content: Vec<u8>) -> Result<()>;
}
