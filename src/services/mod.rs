//! Service layer: the promotion manager callers talk to.

mod promotion_manager;

pub use promotion_manager::{Collaborators, PromotionManager};
