//! Value types shared by every component.

mod request;
mod result;
mod store_key;

pub use request::{new_promotion_id, CallbackMethod, CallbackTarget, PromoteRequest};
pub use result::{PromoteCompleteEvent, PromoteResult, ValidationResult};
pub use store_key::{StoreKey, StoreKeyError, StoreType, DEFAULT_PACKAGE_TYPE};
