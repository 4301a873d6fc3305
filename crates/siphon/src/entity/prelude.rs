//! Common re-exports for convenient entity usage.
//!
//! Entities are suffixed `*Entity` to keep them distinct from the sync-layer
//! domain types (notably [`SyncWindow`](crate::sync::SyncWindow)).

pub use super::page_status::PageStatus;
pub use super::sync_error::{
    ActiveModel as SyncErrorActiveModel, Column as SyncErrorColumn, Entity as SyncErrorEntity,
    Model as SyncErrorModel,
};
pub use super::sync_page::{
    ActiveModel as SyncPageActiveModel, Column as SyncPageColumn, Entity as SyncPageEntity,
    Model as SyncPageModel,
};
pub use super::sync_window::{
    ActiveModel as SyncWindowActiveModel, Column as SyncWindowColumn, Entity as SyncWindowEntity,
    Model as SyncWindowModel,
};
