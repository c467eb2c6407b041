//! In-memory tracking record store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::tracking::Result;
use crate::interfaces::{TrackingError, TrackingStore};
use crate::model::PromoteResult;

/// Tracking store keeping results in memory.
#[derive(Default)]
pub struct MemoryTrackingStore {
    records: RwLock<HashMap<String, BTreeMap<String, PromoteResult>>>,
    fail_on_put: RwLock<bool>,
}

impl MemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }
}

#[async_trait]
impl TrackingStore for MemoryTrackingStore {
    async fn put(
        &self,
        tracking_id: &str,
        promotion_id: &str,
        result: &PromoteResult,
    ) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(TrackingError::Unavailable("tracking store offline".to_string()));
        }
        self.records
            .write()
            .await
            .entry(tracking_id.to_string())
            .or_default()
            .insert(promotion_id.to_string(), result.clone());
        Ok(())
    }

    async fn get(&self, tracking_id: &str) -> Result<BTreeMap<String, PromoteResult>> {
        Ok(self
            .records
            .read()
            .await
            .get(tracking_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, tracking_id: &str) -> Result<()> {
        self.records.write().await.remove(tracking_id);
        Ok(())
    }
}
