//! Promotion outcomes, validation outcomes and completion events.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PromoteRequest, StoreKey};

/// Outcome of running a rule-set against a promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Name of the matched rule-set, if any matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
    /// Semantic failures keyed by rule name.
    #[serde(default)]
    pub errors_by_rule: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn for_rule_set(name: impl Into<String>) -> Self {
        Self {
            rule_set: Some(name.into()),
            errors_by_rule: BTreeMap::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors_by_rule.is_empty()
    }

    pub fn add_error(&mut self, rule: impl Into<String>, message: impl Into<String>) {
        self.errors_by_rule.insert(rule.into(), message.into());
    }
}

/// Result of a promotion or rollback.
///
/// `pending`, `completed` and `skipped` are pairwise disjoint. A result
/// carrying an error never lists as completed a path that is not durably
/// present in the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteResult {
    pub request: PromoteRequest,
    #[serde(default)]
    pub pending_paths: BTreeSet<String>,
    #[serde(default)]
    pub completed_paths: BTreeSet<String>,
    #[serde(default)]
    pub skipped_paths: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationResult>,
}

impl PromoteResult {
    pub fn new(request: PromoteRequest) -> Self {
        Self {
            request,
            pending_paths: BTreeSet::new(),
            completed_paths: BTreeSet::new(),
            skipped_paths: BTreeSet::new(),
            error: None,
            validations: None,
        }
    }

    /// Placeholder handed back for asynchronous requests.
    pub fn accepted(request: PromoteRequest) -> Self {
        let pending = request.paths.clone();
        Self {
            pending_paths: pending,
            ..Self::new(request)
        }
    }

    pub fn failed(request: PromoteRequest, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(request)
        }
    }

    pub fn with_pending(mut self, paths: BTreeSet<String>) -> Self {
        self.pending_paths = paths;
        self
    }

    pub fn with_completed(mut self, paths: BTreeSet<String>) -> Self {
        self.completed_paths = paths;
        self
    }

    pub fn with_skipped(mut self, paths: BTreeSet<String>) -> Self {
        self.skipped_paths = paths;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_validations(mut self, validations: Option<ValidationResult>) -> Self {
        self.validations = validations;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn promotion_id(&self) -> &str {
        &self.request.promotion_id
    }
}

/// Published after a successful promotion so downstream caches can react.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteCompleteEvent {
    pub promotion_id: String,
    pub source: StoreKey,
    pub target: StoreKey,
    pub completed_paths: BTreeSet<String>,
    pub skipped_paths: BTreeSet<String>,
    pub purge_source: bool,
    pub occurred_at: DateTime<Utc>,
}

impl PromoteCompleteEvent {
    pub fn from_result(request: &PromoteRequest, result: &PromoteResult) -> Self {
        Self {
            promotion_id: request.promotion_id.clone(),
            source: request.source.clone(),
            target: request.target.clone(),
            completed_paths: result.completed_paths.clone(),
            skipped_paths: result.skipped_paths.clone(),
            purge_source: request.purge_source,
            occurred_at: Utc::now(),
        }
    }
}
