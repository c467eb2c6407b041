//! In-memory storage service.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::storage::Result;
use crate::interfaces::{CopyResult, FileType, StorageError, StorageService};
use crate::model::StoreKey;

#[derive(Debug, Default)]
struct Filesystem {
    files: BTreeMap<String, Vec<u8>>,
    read_only: bool,
}

/// Storage service that keeps every filesystem in memory.
///
/// Copy semantics mirror the real storage service: existing content at the
/// target wins. Failure injection hooks let tests exercise partial
/// transfers, failed compensation and unavailable listings.
#[derive(Default)]
pub struct MemoryStorage {
    filesystems: RwLock<HashMap<StoreKey, Filesystem>>,
    fail_copy: RwLock<HashSet<String>>,
    fail_delete: RwLock<HashSet<String>>,
    fail_list: RwLock<bool>,
    copy_calls: RwLock<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty filesystem (no-op if it exists).
    pub async fn create(&self, store: &StoreKey) {
        self.filesystems
            .write()
            .await
            .entry(store.clone())
            .or_default();
    }

    /// Write a file directly, bypassing read-only protection.
    pub async fn insert(&self, store: &StoreKey, path: &str, content: impl Into<Vec<u8>>) {
        self.filesystems
            .write()
            .await
            .entry(store.clone())
            .or_default()
            .files
            .insert(path.to_string(), content.into());
    }

    pub async fn set_read_only(&self, store: &StoreKey, read_only: bool) {
        self.filesystems
            .write()
            .await
            .entry(store.clone())
            .or_default()
            .read_only = read_only;
    }

    /// Make copies of `path` fail.
    pub async fn fail_copy_of(&self, path: &str) {
        self.fail_copy.write().await.insert(path.to_string());
    }

    /// Make deletes of `path` fail.
    pub async fn fail_delete_of(&self, path: &str) {
        self.fail_delete.write().await.insert(path.to_string());
    }

    pub async fn set_fail_on_list(&self, fail: bool) {
        *self.fail_list.write().await = fail;
    }

    /// Content of a file, if present.
    pub async fn content(&self, store: &StoreKey, path: &str) -> Option<Vec<u8>> {
        self.filesystems
            .read()
            .await
            .get(store)
            .and_then(|fs| fs.files.get(path).cloned())
    }

    /// Snapshot of a filesystem's files.
    pub async fn snapshot(&self, store: &StoreKey) -> BTreeMap<String, Vec<u8>> {
        self.filesystems
            .read()
            .await
            .get(store)
            .map(|fs| fs.files.clone())
            .unwrap_or_default()
    }

    /// Number of batched copy calls served.
    pub async fn copy_calls(&self) -> usize {
        *self.copy_calls.read().await
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn list(
        &self,
        store: &StoreKey,
        recursive: bool,
        file_type: FileType,
    ) -> Result<Vec<String>> {
        if *self.fail_list.read().await {
            return Err(StorageError::Unavailable("listing failed".to_string()));
        }
        let filesystems = self.filesystems.read().await;
        let fs = filesystems
            .get(store)
            .ok_or_else(|| StorageError::UnknownFilesystem(store.clone()))?;

        let files = fs
            .files
            .keys()
            .filter(|path| recursive || !path.contains('/'))
            .cloned();

        let dirs = || {
            fs.files
                .keys()
                .filter_map(|path| path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
                .filter(|dir| recursive || !dir.contains('/'))
                .collect::<BTreeSet<String>>()
        };

        Ok(match file_type {
            FileType::File => files.collect(),
            FileType::Dir => dirs().into_iter().collect(),
            FileType::All => {
                let mut all: BTreeSet<String> = files.collect();
                all.extend(dirs());
                all.into_iter().collect()
            }
        })
    }

    async fn exists(&self, store: &StoreKey, path: &str) -> Result<bool> {
        Ok(self
            .filesystems
            .read()
            .await
            .get(store)
            .is_some_and(|fs| fs.files.contains_key(path)))
    }

    async fn batch_exists(&self, store: &StoreKey, paths: &[String]) -> Result<BTreeSet<String>> {
        let filesystems = self.filesystems.read().await;
        let fs = filesystems.get(store);
        Ok(paths
            .iter()
            .filter(|path| !fs.is_some_and(|fs| fs.files.contains_key(path.as_str())))
            .cloned()
            .collect())
    }

    async fn copy(
        &self,
        source: &StoreKey,
        target: &StoreKey,
        paths: &BTreeSet<String>,
        fail_when_exists: bool,
    ) -> Result<CopyResult> {
        *self.copy_calls.write().await += 1;
        let fail_copy = self.fail_copy.read().await.clone();
        let mut filesystems = self.filesystems.write().await;

        let source_files = filesystems
            .get(source)
            .ok_or_else(|| StorageError::UnknownFilesystem(source.clone()))?
            .files
            .clone();
        let target_fs = filesystems.entry(target.clone()).or_default();

        let mut result = CopyResult::default();
        let mut errors = Vec::new();

        for path in paths {
            let Some(content) = source_files.get(path) else {
                errors.push(format!("{}: not found in {}", path, source));
                continue;
            };
            if fail_copy.contains(path) {
                errors.push(format!("{}: injected copy failure", path));
                continue;
            }
            match target_fs.files.get(path) {
                Some(existing) if existing == content => {
                    result.skipped.insert(path.clone());
                }
                Some(_) if fail_when_exists => {
                    errors.push(format!("{}: already exists in {}", path, target));
                }
                Some(_) => {
                    result.skipped.insert(path.clone());
                }
                None if target_fs.read_only => {
                    errors.push(format!("{}: {} is read-only", path, target));
                }
                None => {
                    target_fs.files.insert(path.clone(), content.clone());
                    result.completed.insert(path.clone());
                }
            }
        }

        debug!(
            source = %source,
            target = %target,
            completed = result.completed.len(),
            skipped = result.skipped.len(),
            errors = errors.len(),
            "Batch copy finished"
        );

        result.success = errors.is_empty();
        if !errors.is_empty() {
            result.message = Some(errors.join("; "));
        }
        Ok(result)
    }

    async fn delete(&self, store: &StoreKey, paths: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let fail_delete = self.fail_delete.read().await.clone();
        let mut filesystems = self.filesystems.write().await;
        let fs = filesystems
            .get_mut(store)
            .ok_or_else(|| StorageError::UnknownFilesystem(store.clone()))?;

        let mut failed = BTreeSet::new();
        for path in paths {
            if fail_delete.contains(path) || fs.read_only {
                failed.insert(path.clone());
            } else {
                fs.files.remove(path);
            }
        }
        Ok(failed)
    }

    async fn retrieve(&self, store: &StoreKey, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.content(store, path).await)
    }

    async fn put(&self, store: &StoreKey, path: &str, content: Vec<u8>) -> Result<()> {
        let mut filesystems = self.filesystems.write().await;
        let fs = filesystems.entry(store.clone()).or_default();
        if fs.read_only {
            return Err(StorageError::ReadOnly(store.clone()));
        }
        fs.files.insert(path.to_string(), content);
        Ok(())
    }
}
