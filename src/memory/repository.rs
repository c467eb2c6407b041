//! In-memory repository metadata service.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::repository::Result;
use crate::interfaces::{PathStyle, RepositoryError, RepositoryInfo, RepositoryService};
use crate::model::StoreKey;

/// Repository service backed by a map of registered repositories.
#[derive(Default)]
pub struct MemoryRepositoryService {
    repositories: RwLock<HashMap<StoreKey, RepositoryInfo>>,
    unavailable: RwLock<bool>,
}

impl MemoryRepositoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository with plain path styling.
    pub async fn register(&self, key: &StoreKey) {
        self.register_with_style(key, PathStyle::Plain).await;
    }

    pub async fn register_with_style(&self, key: &StoreKey, path_style: PathStyle) {
        self.repositories.write().await.insert(
            key.clone(),
            RepositoryInfo {
                key: key.clone(),
                path_style,
            },
        );
    }

    pub async fn remove(&self, key: &StoreKey) {
        self.repositories.write().await.remove(key);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl RepositoryService for MemoryRepositoryService {
    async fn get_repository(&self, key: &StoreKey) -> Result<Option<RepositoryInfo>> {
        if *self.unavailable.read().await {
            return Err(RepositoryError::Unavailable(
                "repository service unreachable".to_string(),
            ));
        }
        Ok(self.repositories.read().await.get(key).cloned())
    }
}
