//! Built-in rules.

use async_trait::async_trait;
use regex::Regex;

use crate::model::StoreKey;

use super::rule::{RuleError, ValidationRequest, ValidationRule};

/// Parameter holding the regex for [`PathPattern`].
pub const PATH_PATTERN_PARAM: &str = "pathPattern";

/// Refuses snapshot versions.
pub struct NoSnapshots;

#[async_trait]
impl ValidationRule for NoSnapshots {
    fn name(&self) -> &str {
        "no-snapshots"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>, RuleError> {
        let helper = &request.helper;
        let snapshots: Vec<&str> = request
            .source_paths
            .iter()
            .filter(|path| !helper.is_metadata(path))
            .filter(|path| {
                helper
                    .parse_artifact_path(path)
                    .is_some_and(|artifact| artifact.is_snapshot())
            })
            .map(String::as_str)
            .collect();

        if snapshots.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!(
                "Snapshot paths cannot be promoted into {}: {}",
                request.target(),
                snapshots.join(", ")
            )))
        }
    }
}

/// Refuses paths already present in the target or in any verify store.
pub struct NoPreExistingPaths;

#[async_trait]
impl ValidationRule for NoPreExistingPaths {
    fn name(&self) -> &str {
        "no-pre-existing-paths"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>, RuleError> {
        let helper = &request.helper;
        let stores: Vec<StoreKey> = std::iter::once(request.target().clone())
            .chain(request.verify_stores().iter().cloned())
            .collect();

        let checks: Vec<(StoreKey, String)> = stores
            .iter()
            .flat_map(|store| {
                request
                    .source_paths
                    .iter()
                    .map(move |path| (store.clone(), path.clone()))
            })
            .collect();

        let found = helper
            .for_each_parallel(checks, |(store, path)| async move {
                let exists = helper.exists(&store, &path).await?;
                Ok::<_, RuleError>(exists.then(|| format!("{} (in {})", path, store)))
            })
            .await?;

        let existing: Vec<String> = found.into_iter().flatten().collect();
        if existing.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("Paths already exist: {}", existing.join(", "))))
        }
    }
}

/// Refuses paths not matching the `pathPattern` parameter.
pub struct PathPattern;

#[async_trait]
impl ValidationRule for PathPattern {
    fn name(&self) -> &str {
        "path-pattern"
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<Option<String>, RuleError> {
        let pattern = request.parameter(PATH_PATTERN_PARAM).ok_or_else(|| {
            RuleError::new(format!(
                "rule-set '{}' has no '{}' parameter",
                request.rule_set.name, PATH_PATTERN_PARAM
            ))
        })?;
        let regex = Regex::new(pattern)
            .map_err(|e| RuleError::new(format!("invalid {}: {}", PATH_PATTERN_PARAM, e)))?;

        let mismatched: Vec<&str> = request
            .source_paths
            .iter()
            .filter(|path| !regex.is_match(path))
            .map(String::as_str)
            .collect();

        if mismatched.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!(
                "Paths do not match '{}': {}",
                pattern,
                mismatched.join(", ")
            )))
        }
    }
}
