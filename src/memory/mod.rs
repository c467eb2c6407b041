//! In-memory implementations of the collaborator interfaces.
//!
//! Used for standalone mode and testing.

mod content;
mod publisher;
mod repository;
mod storage;
mod tracking;

pub use content::MemoryContentService;
pub use publisher::{ChannelEventPublisher, NoopEventPublisher};
pub use repository::MemoryRepositoryService;
pub use storage::MemoryStorage;
pub use tracking::MemoryTrackingStore;
