//! The promotion state machine.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::callback::CallbackDispatcher;
use crate::config::DEFAULT_REMOTE_BATCH_SIZE;
use crate::conflict::ConflictGuard;
use crate::interfaces::{
    ContentService, EventPublisher, FileType, RepositoryInfo, RepositoryService, StorageService,
    TrackingStore,
};
use crate::memory::NoopEventPublisher;
use crate::model::{PromoteCompleteEvent, PromoteRequest, PromoteResult, StoreKey, ValidationResult};
use crate::utils::paths;
use crate::validation::{RuleValidator, ValidationError};

use super::Result;

/// Executes promotions and rollbacks against the collaborator services.
///
/// Steps run strictly in order within one attempt: resolve paths, set
/// metadata aside, take the conflict guard (only for `fail_when_exists`),
/// validate, resolve repositories, re-hydrate remote sources, copy,
/// compensate or purge, then notify, track and call back.
pub struct PromotionOrchestrator {
    storage: Arc<dyn StorageService>,
    repositories: Arc<dyn RepositoryService>,
    content: Arc<dyn ContentService>,
    tracking: Option<Arc<dyn TrackingStore>>,
    publisher: Arc<dyn EventPublisher>,
    validator: Option<Arc<RuleValidator>>,
    callbacks: Option<Arc<CallbackDispatcher>>,
    conflicts: Arc<ConflictGuard>,
    remote_batch_size: usize,
}

impl PromotionOrchestrator {
    pub fn new(
        storage: Arc<dyn StorageService>,
        repositories: Arc<dyn RepositoryService>,
        content: Arc<dyn ContentService>,
    ) -> Self {
        Self {
            storage,
            repositories,
            content,
            tracking: None,
            publisher: Arc::new(NoopEventPublisher),
            validator: None,
            callbacks: None,
            conflicts: Arc::new(ConflictGuard::new()),
            remote_batch_size: DEFAULT_REMOTE_BATCH_SIZE,
        }
    }

    pub fn with_tracking(mut self, tracking: Arc<dyn TrackingStore>) -> Self {
        self.tracking = Some(tracking);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_validator(mut self, validator: Arc<RuleValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<CallbackDispatcher>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    /// Share a conflict guard between orchestrators.
    pub fn with_conflicts(mut self, conflicts: Arc<ConflictGuard>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_remote_batch_size(mut self, batch_size: usize) -> Self {
        self.remote_batch_size = batch_size.max(1);
        self
    }

    pub fn tracking(&self) -> Option<&Arc<dyn TrackingStore>> {
        self.tracking.as_ref()
    }

    /// Promote `request.paths` (or all content) from source to target.
    ///
    /// Only overload of the rule pool is returned as an error; every other
    /// failure is reported in the result.
    pub async fn promote(&self, request: PromoteRequest) -> Result<PromoteResult> {
        info!(
            promotion_id = %request.promotion_id,
            source = %request.source,
            target = %request.target,
            paths = request.paths.len(),
            dry_run = request.dry_run,
            "Promotion started"
        );

        let result = self.run(&request).await?;
        log_outcome("Promotion", &result);
        self.finish(&request, &result).await;
        Ok(result)
    }

    /// Undo the completed part of `prior` by promoting it back.
    ///
    /// A prior result without completed paths is returned cleaned but
    /// otherwise untouched.
    pub async fn rollback(&self, prior: PromoteResult) -> PromoteResult {
        let mut result = prior;
        if result.completed_paths.is_empty() {
            debug!(
                promotion_id = %result.promotion_id(),
                "Nothing completed, rollback is a no-op"
            );
            result.error = None;
            result.validations = None;
            let request = result.request.clone();
            self.finish(&request, &result).await;
            return result;
        }

        info!(
            promotion_id = %result.promotion_id(),
            source = %result.request.target,
            target = %result.request.source,
            paths = result.completed_paths.len(),
            "Rollback started"
        );

        let reversed = result.request.reversed(result.completed_paths.clone());
        let outcome = self
            .transfer(&reversed, reversed.paths.clone(), BTreeSet::new(), None)
            .await;

        match outcome.error {
            None => {
                let completed = std::mem::take(&mut result.completed_paths);
                result.pending_paths.extend(completed);
                result.error = None;
            }
            Some(e) => result.error = Some(e),
        }

        log_outcome("Rollback", &result);
        let request = result.request.clone();
        self.finish(&request, &result).await;
        result
    }

    async fn run(&self, request: &PromoteRequest) -> Result<PromoteResult> {
        let requested = if request.paths.is_empty() {
            match self
                .storage
                .list(&request.source, true, FileType::File)
                .await
            {
                Ok(listed) => listed.into_iter().collect(),
                Err(e) => {
                    return Ok(PromoteResult::failed(
                        request.clone(),
                        format!("Failed to list content of {}: {}", request.source, e),
                    ))
                }
            }
        } else {
            request.paths.clone()
        };

        let (pending, metadata) = paths::partition_metadata(&requested);
        if pending.is_empty() {
            debug!(
                promotion_id = %request.promotion_id,
                skipped = metadata.len(),
                "Only metadata requested, nothing to transfer"
            );
            return Ok(PromoteResult::new(request.clone()).with_skipped(metadata));
        }

        if !request.fail_when_exists {
            return self.validate_and_transfer(request, &pending, &metadata).await;
        }

        self.conflicts
            .admit(
                &request.target,
                &pending,
                || self.validate_and_transfer(request, &pending, &metadata),
                |conflict| {
                    Ok(PromoteResult::failed(request.clone(), conflict.describe())
                        .with_pending(pending.clone())
                        .with_skipped(metadata.clone()))
                },
            )
            .await
    }

    async fn validate_and_transfer(
        &self,
        request: &PromoteRequest,
        pending: &BTreeSet<String>,
        metadata: &BTreeSet<String>,
    ) -> Result<PromoteResult> {
        let validations = match &self.validator {
            Some(validator) => match validator.validate(request, pending).await {
                Ok(validations) => Some(validations),
                Err(ValidationError::Overloaded(e)) => return Err(e.into()),
                Err(e) => {
                    error!(
                        promotion_id = %request.promotion_id,
                        error = %e,
                        "Validation could not run"
                    );
                    return Ok(PromoteResult::failed(request.clone(), e.to_string())
                        .with_pending(pending.clone())
                        .with_skipped(metadata.clone()));
                }
            },
            None => None,
        };

        if let Some(failed) = validations.as_ref().filter(|v| !v.is_valid()) {
            let result = PromoteResult::failed(request.clone(), validation_failure(failed))
                .with_pending(pending.clone())
                .with_skipped(metadata.clone())
                .with_validations(validations);
            return Ok(result);
        }

        if request.dry_run {
            return Ok(PromoteResult::new(request.clone())
                .with_pending(pending.clone())
                .with_skipped(metadata.clone())
                .with_validations(validations));
        }

        Ok(self
            .transfer(request, pending.clone(), metadata.clone(), validations)
            .await)
    }

    /// Repository resolution through notification. Shared by promote and
    /// rollback.
    async fn transfer(
        &self,
        request: &PromoteRequest,
        pending: BTreeSet<String>,
        mut skipped: BTreeSet<String>,
        validations: Option<ValidationResult>,
    ) -> PromoteResult {
        let failed = |pending: BTreeSet<String>, skipped: BTreeSet<String>, error: String| {
            PromoteResult::failed(request.clone(), error)
                .with_pending(pending)
                .with_skipped(skipped)
                .with_validations(validations.clone())
        };

        if let Err(e) = self.resolve_repositories(request).await {
            return failed(pending, skipped, e);
        }

        if request.source.is_remote() {
            self.rehydrate(&request.source, &pending).await;
        }

        let (completed, copy_skipped, copy_error) = match self
            .storage
            .copy(
                &request.source,
                &request.target,
                &pending,
                request.fail_when_exists,
            )
            .await
        {
            Ok(copy) => {
                let unaccounted: Vec<&str> = pending
                    .iter()
                    .filter(|p| !copy.completed.contains(*p) && !copy.skipped.contains(*p))
                    .map(String::as_str)
                    .collect();
                let error = match (copy.success, copy.message) {
                    (false, message) => {
                        Some(message.unwrap_or_else(|| "copy reported failure".to_string()))
                    }
                    (true, _) if !unaccounted.is_empty() => {
                        Some(format!("paths not transferred: {}", unaccounted.join(", ")))
                    }
                    (true, _) => None,
                };
                (copy.completed, copy.skipped, error)
            }
            Err(e) => (BTreeSet::new(), BTreeSet::new(), Some(e.to_string())),
        };

        if let Some(copy_error) = copy_error {
            let message = self
                .compensate(request, &completed, format!(
                    "Failed to copy from {} to {}: {}",
                    request.source, request.target, copy_error
                ))
                .await;
            return failed(pending, skipped, message);
        }

        if request.purge_source {
            self.purge(request, &pending).await;
        }

        skipped.extend(copy_skipped);
        let result = PromoteResult::new(request.clone())
            .with_completed(completed)
            .with_skipped(skipped)
            .with_validations(validations);

        if request.fire_events {
            self.notify(request, &result).await;
        }
        result
    }

    /// Look up both sides; the error names every side that failed.
    async fn resolve_repositories(&self, request: &PromoteRequest) -> std::result::Result<(), String> {
        let (source, target) = futures::join!(
            self.lookup("source", &request.source),
            self.lookup("target", &request.target)
        );

        match (source, target) {
            (Ok(source), Ok(target)) => {
                debug!(
                    promotion_id = %request.promotion_id,
                    source_style = ?source.path_style,
                    target_style = ?target.path_style,
                    "Resolved repositories"
                );
                Ok(())
            }
            (source, target) => Err([source.err(), target.err()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("; ")),
        }
    }

    async fn lookup(&self, side: &str, key: &StoreKey) -> std::result::Result<RepositoryInfo, String> {
        match self.repositories.get_repository(key).await {
            Ok(Some(info)) => Ok(info),
            Ok(None) => Err(format!("No such {} repository: {}", side, key)),
            Err(e) => Err(format!("Failed to look up {} repository {}: {}", side, key, e)),
        }
    }

    /// Fetch uncached paths of a remote source, in batches. `pending` holds
    /// no metadata or checksum paths, so every missing path is fetched.
    async fn rehydrate(&self, source: &StoreKey, pending: &BTreeSet<String>) {
        let candidates: Vec<String> = pending.iter().cloned().collect();

        for batch in candidates.chunks(self.remote_batch_size) {
            let missing = match self.storage.batch_exists(source, batch).await {
                Ok(missing) => missing,
                Err(e) => {
                    warn!(source = %source, error = %e, "Failed to check remote cache");
                    continue;
                }
            };

            let fetches = missing.iter().map(|path| async move {
                match self.content.retrieve(source, path).await {
                    Ok(Some(_)) => debug!(source = %source, path = %path, "Re-hydrated remote path"),
                    Ok(None) => warn!(source = %source, path = %path, "Remote path not found upstream"),
                    Err(e) => {
                        warn!(source = %source, path = %path, error = %e, "Failed to re-hydrate remote path")
                    }
                }
            });
            join_all(fetches).await;
        }
    }

    /// Best-effort removal of this attempt's writes from the target.
    /// Returns `message` with any deletion failures appended.
    async fn compensate(
        &self,
        request: &PromoteRequest,
        completed: &BTreeSet<String>,
        message: String,
    ) -> String {
        warn!(
            promotion_id = %request.promotion_id,
            target = %request.target,
            completed = completed.len(),
            error = %message,
            "Transfer failed, compensating"
        );
        if completed.is_empty() {
            return message;
        }

        match self.storage.delete(&request.target, completed).await {
            Ok(failed) if failed.is_empty() => message,
            Ok(failed) => {
                let failed: Vec<&str> = failed.iter().map(String::as_str).collect();
                error!(
                    promotion_id = %request.promotion_id,
                    target = %request.target,
                    failed = failed.len(),
                    "Compensation left paths behind"
                );
                format!(
                    "{}; failed to remove from {}: {}",
                    message,
                    request.target,
                    failed.join(", ")
                )
            }
            Err(e) => {
                error!(
                    promotion_id = %request.promotion_id,
                    target = %request.target,
                    error = %e,
                    "Compensation failed"
                );
                format!("{}; failed to remove from {}: {}", message, request.target, e)
            }
        }
    }

    async fn purge(&self, request: &PromoteRequest, transferred: &BTreeSet<String>) {
        match self.storage.delete(&request.source, transferred).await {
            Ok(failed) if failed.is_empty() => {
                debug!(
                    promotion_id = %request.promotion_id,
                    source = %request.source,
                    purged = transferred.len(),
                    "Purged source"
                );
            }
            Ok(failed) => warn!(
                promotion_id = %request.promotion_id,
                source = %request.source,
                failed = failed.len(),
                "Failed to purge some source paths"
            ),
            Err(e) => warn!(
                promotion_id = %request.promotion_id,
                source = %request.source,
                error = %e,
                "Failed to purge source"
            ),
        }
    }

    async fn notify(&self, request: &PromoteRequest, result: &PromoteResult) {
        if !self.publisher.is_configured() {
            return;
        }
        let event = PromoteCompleteEvent::from_result(request, result);
        if let Err(e) = self.publisher.publish(event).await {
            warn!(
                promotion_id = %request.promotion_id,
                error = %e,
                "Failed to publish completion event"
            );
        }
    }

    /// Tracking and callback, for every produced result.
    async fn finish(&self, request: &PromoteRequest, result: &PromoteResult) {
        if let (Some(tracking), Some(tracking_id)) = (&self.tracking, &request.tracking_id) {
            if !request.dry_run {
                if let Err(e) = tracking
                    .put(tracking_id, &request.promotion_id, result)
                    .await
                {
                    warn!(
                        promotion_id = %request.promotion_id,
                        tracking_id = %tracking_id,
                        error = %e,
                        "Failed to store tracking record"
                    );
                }
            }
        }

        if let (Some(callbacks), Some(target)) = (&self.callbacks, &request.callback) {
            callbacks.dispatch(target.clone(), result.clone());
        }
    }
}

fn validation_failure(validations: &ValidationResult) -> String {
    let failures: Vec<String> = validations
        .errors_by_rule
        .iter()
        .map(|(rule, message)| format!("{}: {}", rule, message))
        .collect();
    format!(
        "Validation failed for rule-set {}: {}",
        validations.rule_set.as_deref().unwrap_or("<none>"),
        failures.join("; ")
    )
}

fn log_outcome(operation: &str, result: &PromoteResult) {
    match &result.error {
        None => info!(
            promotion_id = %result.promotion_id(),
            completed = result.completed_paths.len(),
            skipped = result.skipped_paths.len(),
            pending = result.pending_paths.len(),
            "{} succeeded",
            operation
        ),
        Some(e) => warn!(
            promotion_id = %result.promotion_id(),
            error = %e,
            "{} failed",
            operation
        ),
    }
}
