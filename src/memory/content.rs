//! In-memory content retrieval with remote re-hydration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::content::Result;
use crate::interfaces::{ContentError, ContentService, StorageService};
use crate::model::StoreKey;

use super::MemoryStorage;

/// Content service reading through [`MemoryStorage`].
///
/// A remote repository can be linked to an upstream filesystem; retrieving
/// a path missing from the remote's cache fetches it from upstream and
/// caches it, like a proxy repository would.
pub struct MemoryContentService {
    storage: Arc<MemoryStorage>,
    upstreams: RwLock<HashMap<StoreKey, StoreKey>>,
    fetched: RwLock<Vec<(StoreKey, String)>>,
}

impl MemoryContentService {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            upstreams: RwLock::new(HashMap::new()),
            fetched: RwLock::new(Vec::new()),
        }
    }

    /// Serve cache misses of `remote` from `upstream`.
    pub async fn link_upstream(&self, remote: &StoreKey, upstream: &StoreKey) {
        self.upstreams
            .write()
            .await
            .insert(remote.clone(), upstream.clone());
    }

    /// Every `(store, path)` fetched from an upstream so far.
    pub async fn fetched(&self) -> Vec<(StoreKey, String)> {
        self.fetched.read().await.clone()
    }

    async fn fetch_upstream(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(upstream) = self.upstreams.read().await.get(store).cloned() else {
            return Ok(None);
        };
        self.fetched
            .write()
            .await
            .push((store.clone(), path.to_string()));

        let Some(content) = self.storage.retrieve(&upstream, path).await? else {
            return Ok(None);
        };
        self.storage
            .put(store, path, content.clone())
            .await
            .map_err(|e| ContentError::Upstream {
                store: store.clone(),
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(store = %store, path = %path, "Cached content from upstream");
        Ok(Some(content))
    }
}

#[async_trait]
impl ContentService for MemoryContentService {
    async fn retrieve(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>> {
        if let Some(content) = self.storage.retrieve(store, path).await? {
            return Ok(Some(content));
        }
        if store.is_remote() {
            return self.fetch_upstream(store, path).await;
        }
        Ok(None)
    }

    async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool> {
        Ok(self.storage.exists(store, path).await?)
    }
}
