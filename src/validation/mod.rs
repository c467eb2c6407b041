//! Rule-based validation of promotions.
//!
//! The target repository is matched against the registered rule-sets; the
//! first match decides which rules run. Every rule runs as its own task on
//! the rule pool and the validator waits, up to a ceiling, for all of them.
//! A rule reporting a message fails the promotion without being an error;
//! a rule that cannot run makes validation itself fail.

mod helper;
mod rule;
mod rules;
mod ruleset;

pub use helper::{ValidationHelper, DEFAULT_PARALLELISM};
pub use rule::{RuleError, RuleRegistry, ValidationRequest, ValidationRule};
pub use rules::{NoPreExistingPaths, NoSnapshots, PathPattern, PATH_PATTERN_PARAM};
pub use ruleset::{RuleSetRegistry, ValidationRuleSet};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{PoolLimits, ValidationConfig, DEFAULT_VALIDATION_TIMEOUT_SECS};
use crate::interfaces::ContentService;
use crate::model::{PromoteRequest, ValidationResult};
use crate::pool::{PoolError, WorkerPool};

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Validation could not produce a verdict.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Validation failed to execute: {0}")]
    Execution(String),

    #[error("Validation did not finish within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Overloaded(#[from] PoolError),

    #[error("No rule registered under '{0}'")]
    UnknownRule(String),
}

/// Runs the rule-set matching a promotion's target.
pub struct RuleValidator {
    rule_sets: Arc<RuleSetRegistry>,
    rules: Arc<RuleRegistry>,
    pool: WorkerPool,
    helper: ValidationHelper,
    drain_timeout: Duration,
}

impl RuleValidator {
    pub fn new(
        rule_sets: RuleSetRegistry,
        rules: RuleRegistry,
        content: Arc<dyn ContentService>,
    ) -> Self {
        Self {
            rule_sets: Arc::new(rule_sets),
            rules: Arc::new(rules),
            pool: WorkerPool::new("rule", &PoolLimits::rules()),
            helper: ValidationHelper::new(content),
            drain_timeout: Duration::from_secs(DEFAULT_VALIDATION_TIMEOUT_SECS),
        }
    }

    pub fn from_config(
        config: &ValidationConfig,
        rule_sets: RuleSetRegistry,
        rules: RuleRegistry,
        content: Arc<dyn ContentService>,
    ) -> Self {
        Self::new(rule_sets, rules, content)
            .with_pool(&config.pool)
            .with_drain_timeout(config.timeout())
    }

    pub fn with_pool(mut self, limits: &PoolLimits) -> Self {
        self.pool = WorkerPool::new("rule", limits);
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Judge `request`, whose non-metadata paths are `source_paths`.
    ///
    /// `Ok` carries the verdict, valid or not. `Err` means no verdict could
    /// be reached.
    pub async fn validate(
        &self,
        request: &PromoteRequest,
        source_paths: &BTreeSet<String>,
    ) -> Result<ValidationResult> {
        let Some(rule_set) = self.rule_sets.matching(&request.target) else {
            debug!(
                promotion_id = %request.promotion_id,
                target = %request.target,
                "No rule-set matches target"
            );
            return Ok(ValidationResult::default());
        };

        let mut result = ValidationResult::for_rule_set(&rule_set.name);
        if rule_set.rule_names.is_empty() {
            return Ok(result);
        }

        let rules = rule_set
            .rule_names
            .iter()
            .map(|name| {
                self.rules
                    .get(name)
                    .map(|rule| (name.clone(), rule))
                    .ok_or_else(|| ValidationError::UnknownRule(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let validation_request = ValidationRequest {
            promote: Arc::new(request.clone()),
            rule_set: Arc::clone(&rule_set),
            source_paths: Arc::new(source_paths.clone()),
            helper: self.helper.clone(),
        };

        let mut handles = Vec::with_capacity(rules.len());
        for (name, rule) in rules {
            let validation_request = validation_request.clone();
            let submitted = self.pool.submit(async move {
                let outcome = rule.validate(&validation_request).await;
                (name, outcome)
            });
            match submitted {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    handles.iter().for_each(|h| h.abort());
                    return Err(e.into());
                }
            }
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let joined = match tokio::time::timeout(self.drain_timeout, join_all(handles)).await {
            Ok(joined) => joined,
            Err(_) => {
                aborts.iter().for_each(|h| h.abort());
                warn!(
                    promotion_id = %request.promotion_id,
                    rule_set = %rule_set.name,
                    timeout = ?self.drain_timeout,
                    "Validation rules did not finish in time"
                );
                return Err(ValidationError::Timeout(self.drain_timeout));
            }
        };

        let mut failures = Vec::new();
        for outcome in joined {
            match outcome {
                Ok((_, Ok(None))) => {}
                Ok((name, Ok(Some(message)))) => result.add_error(name, message),
                Ok((name, Err(e))) => failures.push(format!("{}: {}", name, e)),
                Err(e) => failures.push(format!("rule task failed: {}", e)),
            }
        }

        if !failures.is_empty() {
            warn!(
                promotion_id = %request.promotion_id,
                rule_set = %rule_set.name,
                failures = failures.len(),
                "Validation rules failed to execute"
            );
            return Err(ValidationError::Execution(failures.join("; ")));
        }

        info!(
            promotion_id = %request.promotion_id,
            rule_set = %rule_set.name,
            valid = result.is_valid(),
            failed_rules = result.errors_by_rule.len(),
            "Validation finished"
        );
        Ok(result)
    }
}
