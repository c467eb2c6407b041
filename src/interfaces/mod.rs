//! Abstract interfaces for the services promotion orchestrates.
//!
//! These traits define the contracts for:
//! - Storage (listing, copying and deleting repository content)
//! - Repository metadata (existence and path style)
//! - Content retrieval (including remote re-hydration)
//! - Tracking records (durable results keyed by tracking id)
//! - Completion events (downstream cache invalidation)

pub mod content;
pub mod event_publisher;
pub mod repository;
pub mod storage;
pub mod tracking;

pub use content::{ContentError, ContentService};
pub use event_publisher::{EventPublisher, PublishError};
pub use repository::{PathStyle, RepositoryError, RepositoryInfo, RepositoryService};
pub use storage::{CopyResult, FileType, StorageError, StorageService};
pub use tracking::{TrackingError, TrackingStore};
