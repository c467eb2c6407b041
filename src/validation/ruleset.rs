//! Rule-sets: named lists of rules bound to repositories by key pattern.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::model::StoreKey;

/// A named collection of rules applied to promotions into matching targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleSet {
    pub name: String,
    /// Regex matched against the target's full canonical (or legacy) key.
    pub store_key_pattern: String,
    /// Rule names, run concurrently.
    #[serde(default)]
    pub rule_names: Vec<String>,
    /// Free-form rule parameters (patterns, thresholds).
    #[serde(default)]
    pub validation_parameters: BTreeMap<String, String>,
    /// Extra repositories rules should cross-check.
    #[serde(default)]
    pub verify_stores: Vec<StoreKey>,
}

impl ValidationRuleSet {
    pub fn new(name: impl Into<String>, store_key_pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_key_pattern: store_key_pattern.into(),
            rule_names: Vec::new(),
            validation_parameters: BTreeMap::new(),
            verify_stores: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule_names.push(rule.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.validation_parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_verify_store(mut self, key: StoreKey) -> Self {
        self.verify_stores.push(key);
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.validation_parameters.get(key).map(String::as_str)
    }
}

struct CompiledRuleSet {
    rule_set: Arc<ValidationRuleSet>,
    pattern: Regex,
}

/// Rule-sets in registration order. Read-only once requests are served.
#[derive(Default)]
pub struct RuleSetRegistry {
    rule_sets: Vec<CompiledRuleSet>,
}

impl RuleSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule-set. Its pattern must compile.
    pub fn register(&mut self, rule_set: ValidationRuleSet) -> Result<(), ConfigError> {
        let pattern = Regex::new(&format!("^(?:{})$", rule_set.store_key_pattern)).map_err(|e| {
            ConfigError::InvalidRuleSet {
                name: rule_set.name.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(
            rule_set = %rule_set.name,
            pattern = %rule_set.store_key_pattern,
            rules = rule_set.rule_names.len(),
            "Registered rule-set"
        );
        self.rule_sets.push(CompiledRuleSet {
            rule_set: Arc::new(rule_set),
            pattern,
        });
        Ok(())
    }

    pub fn with_rule_set(mut self, rule_set: ValidationRuleSet) -> Result<Self, ConfigError> {
        self.register(rule_set)?;
        Ok(self)
    }

    /// Load every `*.json`, `*.yaml` and `*.yml` document in `dir`, in file
    /// name order.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let read_err = |path: &Path, reason: String| ConfigError::RuleSet {
            path: path.to_path_buf(),
            reason,
        };

        let mut files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| read_err(dir, e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("json" | "yaml" | "yml")
                )
            })
            .collect();
        files.sort();

        let mut registry = Self::new();
        for path in files {
            let text = std::fs::read_to_string(&path).map_err(|e| read_err(&path, e.to_string()))?;
            let rule_set: ValidationRuleSet = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => {
                    serde_json::from_str(&text).map_err(|e| read_err(&path, e.to_string()))?
                }
                _ => serde_yaml::from_str(&text).map_err(|e| read_err(&path, e.to_string()))?,
            };
            registry.register(rule_set)?;
        }

        info!(dir = %dir.display(), rule_sets = registry.len(), "Loaded rule-sets");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.rule_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }

    /// First rule-set, in registration order, matching `target`'s canonical
    /// key or its legacy `storeType:name` form.
    pub fn matching(&self, target: &StoreKey) -> Option<Arc<ValidationRuleSet>> {
        let canonical = target.canonical();
        let legacy = target.legacy();
        self.rule_sets
            .iter()
            .find(|c| c.pattern.is_match(&canonical) || c.pattern.is_match(&legacy))
            .map(|c| Arc::clone(&c.rule_set))
    }
}
