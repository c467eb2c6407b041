#![allow(dead_code)]

//! Shared fixtures: in-memory collaborators and a storage wrapper that can
//! hold a copy open.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use artifact_promote::interfaces::storage::Result as StorageResult;
use artifact_promote::interfaces::{CopyResult, FileType, StorageService};
use artifact_promote::memory::{
    MemoryContentService, MemoryRepositoryService, MemoryStorage, MemoryTrackingStore,
};
use artifact_promote::{PromotionOrchestrator, StoreKey};

pub const JAR: &str = "org/foo/1.0/foo-1.0.jar";
pub const POM: &str = "org/foo/1.0/foo-1.0.pom";
pub const JAR_SHA1: &str = "org/foo/1.0/foo-1.0.jar.sha1";
pub const METADATA: &str = "org/foo/maven-metadata.xml";
pub const METADATA_MD5: &str = "org/foo/maven-metadata.xml.md5";

pub fn staging() -> StoreKey {
    StoreKey::hosted("maven", "staging")
}

pub fn releases() -> StoreKey {
    StoreKey::hosted("maven", "releases")
}

pub fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Collaborators with `staging` holding a small artifact and its metadata,
/// and an empty `releases`.
pub struct World {
    pub storage: Arc<MemoryStorage>,
    pub repositories: Arc<MemoryRepositoryService>,
    pub content: Arc<MemoryContentService>,
    pub tracking: Arc<MemoryTrackingStore>,
}

impl World {
    pub async fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        for path in [JAR, POM, JAR_SHA1, METADATA, METADATA_MD5] {
            storage.insert(&staging(), path, format!("staged {}", path)).await;
        }
        storage.create(&releases()).await;

        let repositories = Arc::new(MemoryRepositoryService::new());
        repositories.register(&staging()).await;
        repositories.register(&releases()).await;

        Self {
            content: Arc::new(MemoryContentService::new(Arc::clone(&storage))),
            storage,
            repositories,
            tracking: Arc::new(MemoryTrackingStore::new()),
        }
    }

    pub fn orchestrator(&self) -> PromotionOrchestrator {
        self.orchestrator_over(Arc::clone(&self.storage) as _)
    }

    pub fn orchestrator_over(&self, storage: Arc<dyn StorageService>) -> PromotionOrchestrator {
        PromotionOrchestrator::new(
            storage,
            Arc::clone(&self.repositories) as _,
            Arc::clone(&self.content) as _,
        )
        .with_tracking(Arc::clone(&self.tracking) as _)
    }
}

/// Storage whose copies wait for [`GatedStorage::open`] after announcing
/// themselves through [`GatedStorage::entered`].
pub struct GatedStorage {
    inner: Arc<MemoryStorage>,
    entered: Notify,
    gate: Semaphore,
}

impl GatedStorage {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    /// Wait until a copy is in progress.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl StorageService for GatedStorage {
    async fn list(
        &self,
        store: &StoreKey,
        recursive: bool,
        file_type: FileType,
    ) -> StorageResult<Vec<String>> {
        self.inner.list(store, recursive, file_type).await
    }

    async fn exists(&self, store: &StoreKey, path: &str) -> StorageResult<bool> {
        self.inner.exists(store, path).await
    }

    async fn batch_exists(
        &self,
        store: &StoreKey,
        paths: &[String],
    ) -> StorageResult<BTreeSet<String>> {
        self.inner.batch_exists(store, paths).await
    }

    async fn copy(
        &self,
        source: &StoreKey,
        target: &StoreKey,
        paths: &BTreeSet<String>,
        fail_when_exists: bool,
    ) -> StorageResult<CopyResult> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await;
        self.inner.copy(source, target, paths, fail_when_exists).await
    }

    async fn delete(
        &self,
        store: &StoreKey,
        paths: &BTreeSet<String>,
    ) -> StorageResult<BTreeSet<String>> {
        self.inner.delete(store, paths).await
    }

    async fn retrieve(&self, store: &StoreKey, path: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.retrieve(store, path).await
    }

    async fn put(&self, store: &StoreKey, path: &str, content: Vec<u8>) -> StorageResult<()> {
        self.inner.put(store, path, content).await
    }
}
