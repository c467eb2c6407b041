//! Rule capability and the name-keyed registry of rule implementations.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::interfaces::ContentError;
use crate::model::{PromoteRequest, StoreKey};

use super::helper::ValidationHelper;
use super::ruleset::ValidationRuleSet;
use super::rules::{NoPreExistingPaths, NoSnapshots, PathPattern};

/// A rule implementation failed to run. Distinct from a semantic failure,
/// which a rule reports as `Ok(Some(message))`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ContentError> for RuleError {
    fn from(e: ContentError) -> Self {
        Self(e.to_string())
    }
}

/// Everything a rule sees about the promotion it judges.
#[derive(Clone)]
pub struct ValidationRequest {
    pub promote: Arc<PromoteRequest>,
    pub rule_set: Arc<ValidationRuleSet>,
    /// Non-metadata paths about to be transferred.
    pub source_paths: Arc<BTreeSet<String>>,
    pub helper: ValidationHelper,
}

impl ValidationRequest {
    pub fn target(&self) -> &StoreKey {
        &self.promote.target
    }

    pub fn source(&self) -> &StoreKey {
        &self.promote.source
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.rule_set.parameter(key)
    }

    pub fn verify_stores(&self) -> &[StoreKey] {
        &self.rule_set.verify_stores
    }
}

/// A named validation rule.
///
/// `Ok(None)` passes, `Ok(Some(message))` fails the promotion with
/// `message`, `Err` aborts validation of the whole request.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>, RuleError>;
}

/// Rule implementations keyed by name.
#[derive(Default, Clone)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<dyn ValidationRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the rules shipped with the crate.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoSnapshots));
        registry.register(Arc::new(NoPreExistingPaths));
        registry.register(Arc::new(PathPattern));
        registry
    }

    /// Register a rule, replacing any rule with the same name.
    pub fn register(&mut self, rule: Arc<dyn ValidationRule>) {
        self.rules.insert(rule.name().to_string(), rule);
    }

    pub fn with_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.register(rule);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ValidationRule>> {
        self.rules.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
