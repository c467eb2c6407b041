//! Facade handed to rules: content lookups, iteration helpers and path parsing.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};

use crate::interfaces::{ContentError, ContentService};
use crate::model::StoreKey;
use crate::utils::paths::{self, ArtifactRef};

/// Default fan-out of [`ValidationHelper::for_each_parallel`].
pub const DEFAULT_PARALLELISM: usize = 8;

/// Helper facade exposed to every rule invocation.
#[derive(Clone)]
pub struct ValidationHelper {
    content: Arc<dyn ContentService>,
    parallelism: usize,
}

impl ValidationHelper {
    pub fn new(content: Arc<dyn ContentService>) -> Self {
        Self {
            content,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool, ContentError> {
        self.content.exists(store, path).await
    }

    pub async fn retrieve(
        &self,
        store: &StoreKey,
        path: &str,
    ) -> Result<Option<Vec<u8>>, ContentError> {
        self.content.retrieve(store, path).await
    }

    /// Hex SHA-256 of a path's content, `None` if the path does not exist.
    pub async fn digest(&self, store: &StoreKey, path: &str) -> Result<Option<String>, ContentError> {
        Ok(self
            .content
            .retrieve(store, path)
            .await?
            .map(|content| hex::encode(Sha256::digest(&content))))
    }

    /// Run `f` over `items` with bounded concurrency, stopping at the first error.
    /// Output order follows input order.
    pub async fn for_each_parallel<T, R, E, F, Fut>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, E>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items)
            .map(f)
            .buffered(self.parallelism)
            .try_collect()
            .await
    }

    /// Run `f` over consecutive batches of at most `batch_size` items, in order.
    pub async fn for_each_batched<T, R, E, F, Fut>(
        &self,
        items: &[T],
        batch_size: usize,
        mut f: F,
    ) -> Result<Vec<R>, E>
    where
        F: FnMut(&[T]) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut results = Vec::new();
        for batch in items.chunks(batch_size.max(1)) {
            results.push(f(batch).await?);
        }
        Ok(results)
    }

    pub fn parse_artifact_path(&self, path: &str) -> Option<ArtifactRef> {
        paths::parse_artifact_path(path)
    }

    pub fn is_metadata(&self, path: &str) -> bool {
        paths::is_metadata(path)
    }

    pub fn is_checksum(&self, path: &str) -> bool {
        paths::is_checksum(path)
    }
}
