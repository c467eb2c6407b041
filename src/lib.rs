//! Artifact promotion engine.
//!
//! Moves content from a source repository to a target repository with an
//! all-or-nothing guarantee: pluggable rule validation before the transfer,
//! compensation when the transfer fails part way, rollback of completed
//! promotions, and at-least-once delivery of results to caller webhooks.
//!
//! The engine owns no storage. It orchestrates the storage, repository,
//! content, tracking and event services described in [`interfaces`];
//! [`memory`] provides in-process implementations of each.

pub mod callback;
pub mod config;
pub mod conflict;
pub mod interfaces;
pub mod memory;
pub mod model;
pub mod orchestration;
pub mod pool;
pub mod services;
pub mod utils;
pub mod validation;

pub use callback::{CallbackDispatcher, Delivery};
pub use config::Config;
pub use conflict::ConflictGuard;
pub use model::{CallbackTarget, PromoteRequest, PromoteResult, StoreKey, ValidationResult};
pub use orchestration::{PromoteError, PromotionOrchestrator};
pub use services::{Collaborators, PromotionManager};
pub use validation::{RuleRegistry, RuleSetRegistry, RuleValidator};
