//! SyncPage entity - per-(window, page) progress record.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::page_status::PageStatus;

/// SyncPage model - the durable status of one fetched page.
///
/// Unique over (window_id, page). Rows are never deleted except when the
/// window is reset for a fresh run.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_pages")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning sync window.
    pub window_id: Uuid,
    /// Page number, 1-indexed.
    pub page: i32,
    /// Outcome of the page's most recent attempt.
    pub status: PageStatus,

    /// When the status last changed.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A page record belongs to a window.
    #[sea_orm(
        belongs_to = "super::sync_window::Entity",
        from = "Column::WindowId",
        to = "super::sync_window::Column::Id"
    )]
    SyncWindow,
}

impl Related<super::sync_window::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncWindow.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
