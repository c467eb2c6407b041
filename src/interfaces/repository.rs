//! Repository metadata service interface.

use async_trait::async_trait;

use crate::model::StoreKey;

/// Result type for repository lookups.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors that can occur while looking up repository metadata.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("Repository not found: {0}")]
    NotFound(StoreKey),

    #[error("Repository service unavailable: {0}")]
    Unavailable(String),
}

/// How a repository lays out paths in its filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStyle {
    #[default]
    Plain,
    Hashed,
}

/// Metadata of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub key: StoreKey,
    pub path_style: PathStyle,
}

/// Interface to the repository-metadata service.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    /// Look up a repository. Returns `Ok(None)` if it does not exist.
    async fn get_repository(&self, key: &StoreKey) -> Result<Option<RepositoryInfo>>;
}
