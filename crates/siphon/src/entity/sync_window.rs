//! SyncWindow entity - one synchronization scope per (element, operation, date range).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SyncWindow model - tracks a window's expected page count and completion.
///
/// The natural key is (element, operation, start_date, end_date); a completed
/// window is immutable and skipped by future runs over the same range.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_windows")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Remote data element this window covers.
    pub element: String,
    /// Sync operation name (insert, update, delete, ...).
    pub operation: String,
    /// Inclusive start of the window's date range.
    pub start_date: Date,
    /// Inclusive end of the window's date range.
    pub end_date: Date,

    /// Expected page count; null until counted or discovered.
    pub expected_pages: Option<i32>,
    /// Whether every expected page completed and the window was finalized.
    pub completed: bool,

    /// When the window was first referenced.
    pub created_at: DateTimeWithTimeZone,
    /// When the window was finalized, if it was.
    pub finalized_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A window owns its per-page progress records.
    #[sea_orm(has_many = "super::sync_page::Entity")]
    SyncPage,
    /// A window owns its error-log entries.
    #[sea_orm(has_many = "super::sync_error::Entity")]
    SyncError,
}

impl Related<super::sync_page::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncPage.def()
    }
}

impl Related<super::sync_error::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncError.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
