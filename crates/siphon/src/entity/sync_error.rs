//! SyncError entity - error log keyed by (window, page).
//!
//! Fatal fetch failures and stalled loads are recorded here so operators can
//! see exactly why a page never completed without trawling process logs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SyncError model - one logged failure for one page attempt.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_errors")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning sync window.
    pub window_id: Uuid,
    /// Page number the failure belongs to.
    pub page: i32,
    /// Failure description as reported by the worker or loader.
    #[sea_orm(column_type = "Text")]
    pub message: String,

    /// When the failure was recorded.
    pub occurred_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// An error entry belongs to a window.
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
