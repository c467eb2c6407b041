//! Content retrieval service interface.

use async_trait::async_trait;

use crate::model::StoreKey;

use super::StorageError;

/// Result type for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors that can occur while retrieving content.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentError {
    #[error("Upstream fetch failed for {store}/{path}: {reason}")]
    Upstream {
        store: StoreKey,
        path: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Content service unavailable: {0}")]
    Unavailable(String),
}

/// Interface to the content-retrieval service.
///
/// For remote repositories a retrieve fetches from upstream and caches the
/// result in storage.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Retrieve content; `Ok(None)` means not found (404).
    async fn retrieve(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>>;

    /// Check whether content exists.
    async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool>;
}
