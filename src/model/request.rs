//! Promotion requests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreKey;

/// HTTP method used to deliver a callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackMethod {
    #[default]
    Post,
    Put,
}

impl fmt::Display for CallbackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackMethod::Post => f.write_str("POST"),
            CallbackMethod::Put => f.write_str("PUT"),
        }
    }
}

/// Caller-supplied webhook that receives the final result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTarget {
    pub url: String,
    #[serde(default)]
    pub method: CallbackMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl CallbackTarget {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: CallbackMethod::Post,
            headers: BTreeMap::new(),
        }
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self {
            method: CallbackMethod::Put,
            ..Self::post(url)
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// A request to copy paths from `source` to `target`.
///
/// `promotion_id` is generated once and stays stable across retries of the
/// same logical request. An empty `paths` set means "all non-metadata
/// content of the source".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteRequest {
    #[serde(default = "new_promotion_id")]
    pub promotion_id: String,
    pub source: StoreKey,
    pub target: StoreKey,
    #[serde(default)]
    pub paths: BTreeSet<String>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub purge_source: bool,
    #[serde(default)]
    pub fail_when_exists: bool,
    #[serde(default = "default_true")]
    pub fire_events: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackTarget>,
}

/// Generate a fresh promotion id.
pub fn new_promotion_id() -> String {
    Uuid::new_v4().to_string()
}

impl PromoteRequest {
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            promotion_id: new_promotion_id(),
            source,
            target,
            paths: BTreeSet::new(),
            is_async: false,
            dry_run: false,
            purge_source: false,
            fail_when_exists: false,
            fire_events: true,
            tracking_id: None,
            callback: None,
        }
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_purge_source(mut self, purge: bool) -> Self {
        self.purge_source = purge;
        self
    }

    pub fn with_fail_when_exists(mut self, fail: bool) -> Self {
        self.fail_when_exists = fail;
        self
    }

    pub fn with_fire_events(mut self, fire: bool) -> Self {
        self.fire_events = fire;
        self
    }

    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    pub fn with_callback(mut self, callback: CallbackTarget) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Derive the compensating request used by rollback.
    ///
    /// Source and target are swapped, the source is purged afterwards and
    /// the copy never fails on existing content.
    pub fn reversed(&self, paths: BTreeSet<String>) -> Self {
        Self {
            promotion_id: self.promotion_id.clone(),
            source: self.target.clone(),
            target: self.source.clone(),
            paths,
            is_async: false,
            dry_run: false,
            purge_source: true,
            fail_when_exists: false,
            fire_events: self.fire_events,
            tracking_id: self.tracking_id.clone(),
            callback: self.callback.clone(),
        }
    }
}
