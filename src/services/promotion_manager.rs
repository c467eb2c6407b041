//! Promotion manager: the interface callers use.
//!
//! Every promotion or rollback runs as one unit on the promotion pool.
//! Synchronous callers wait for the unit; asynchronous callers get an
//! accepted placeholder back at once while the unit finishes in the
//! background, its outcome reaching them through tracking and callback.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::callback::CallbackDispatcher;
use crate::config::{Config, ConfigError, PoolLimits};
use crate::interfaces::{
    ContentService, EventPublisher, RepositoryService, StorageService, TrackingError,
    TrackingStore,
};
use crate::model::{PromoteRequest, PromoteResult};
use crate::orchestration::{PromoteError, PromotionOrchestrator, Result};
use crate::pool::WorkerPool;
use crate::validation::{RuleRegistry, RuleSetRegistry, RuleValidator};

/// External services the engine runs against.
pub struct Collaborators {
    pub storage: Arc<dyn StorageService>,
    pub repositories: Arc<dyn RepositoryService>,
    pub content: Arc<dyn ContentService>,
    pub tracking: Option<Arc<dyn TrackingStore>>,
    pub publisher: Option<Arc<dyn EventPublisher>>,
}

/// Runs promotions and rollbacks on a bounded pool.
pub struct PromotionManager {
    orchestrator: Arc<PromotionOrchestrator>,
    pool: WorkerPool,
    callbacks: Option<Arc<CallbackDispatcher>>,
}

impl PromotionManager {
    pub fn new(orchestrator: PromotionOrchestrator, limits: &PoolLimits) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            pool: WorkerPool::new("promotion", limits),
            callbacks: None,
        }
    }

    /// Wire the engine from configuration.
    ///
    /// Rule-sets are loaded from `validation.rule_set_dir` when set; `rules`
    /// supplies their implementations.
    pub fn build(
        config: &Config,
        collaborators: Collaborators,
        rules: RuleRegistry,
    ) -> std::result::Result<Self, ConfigError> {
        let rule_sets = match &config.validation.rule_set_dir {
            Some(dir) => RuleSetRegistry::load_dir(dir)?,
            None => RuleSetRegistry::new(),
        };
        let validator = RuleValidator::from_config(
            &config.validation,
            rule_sets,
            rules,
            Arc::clone(&collaborators.content),
        );
        let callbacks = Arc::new(CallbackDispatcher::new(&config.callback)?);

        let mut orchestrator = PromotionOrchestrator::new(
            collaborators.storage,
            collaborators.repositories,
            collaborators.content,
        )
        .with_validator(Arc::new(validator))
        .with_callbacks(Arc::clone(&callbacks))
        .with_remote_batch_size(config.remote.batch_size);

        if let Some(tracking) = collaborators.tracking {
            orchestrator = orchestrator.with_tracking(tracking);
        }
        if let Some(publisher) = collaborators.publisher {
            orchestrator = orchestrator.with_publisher(publisher);
        }

        info!(
            promotion_threads = config.pool.threads,
            rule_threads = config.validation.pool.threads,
            "Promotion manager ready"
        );

        Ok(Self {
            callbacks: Some(callbacks),
            ..Self::new(orchestrator, &config.pool)
        })
    }

    /// Promote, waiting for the outcome unless the request is `async`.
    pub async fn promote(&self, request: PromoteRequest) -> Result<PromoteResult> {
        let placeholder = request.is_async.then(|| PromoteResult::accepted(request.clone()));
        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = self
            .pool
            .submit(async move { orchestrator.promote(request).await })?;

        match placeholder {
            Some(placeholder) => {
                detach(placeholder.promotion_id().to_string(), "promotion", handle);
                Ok(placeholder)
            }
            None => handle.await?,
        }
    }

    /// Roll back `prior`, waiting for the outcome unless its request was `async`.
    pub async fn rollback(&self, prior: PromoteResult) -> Result<PromoteResult> {
        let placeholder = prior.request.is_async.then(|| prior.clone());
        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = self
            .pool
            .submit(async move { Ok::<_, PromoteError>(orchestrator.rollback(prior).await) })?;

        match placeholder {
            Some(placeholder) => {
                detach(placeholder.promotion_id().to_string(), "rollback", handle);
                Ok(placeholder)
            }
            None => handle.await?,
        }
    }

    /// Every result recorded under `tracking_id`, keyed by promotion id.
    pub async fn query_tracking(
        &self,
        tracking_id: &str,
    ) -> std::result::Result<BTreeMap<String, PromoteResult>, TrackingError> {
        self.tracking()?.get(tracking_id).await
    }

    pub async fn delete_tracking(&self, tracking_id: &str) -> std::result::Result<(), TrackingError> {
        self.tracking()?.delete(tracking_id).await
    }

    /// Stop background callback redelivery.
    pub async fn shutdown(&self) {
        if let Some(callbacks) = &self.callbacks {
            callbacks.shutdown().await;
        }
    }

    fn tracking(&self) -> std::result::Result<&Arc<dyn TrackingStore>, TrackingError> {
        self.orchestrator
            .tracking()
            .ok_or(TrackingError::NotConfigured)
    }
}

/// Log the outcome of a unit nobody waits for.
fn detach(promotion_id: String, operation: &'static str, handle: JoinHandle<Result<PromoteResult>>) {
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(result)) => info!(
                promotion_id = %promotion_id,
                operation,
                succeeded = result.succeeded(),
                "Background unit finished"
            ),
            Ok(Err(e)) => warn!(
                promotion_id = %promotion_id,
                operation,
                error = %e,
                "Background unit rejected"
            ),
            Err(e) => error!(
                promotion_id = %promotion_id,
                operation,
                error = %PromoteError::from(e),
                "Background unit failed"
            ),
        }
    });
}
