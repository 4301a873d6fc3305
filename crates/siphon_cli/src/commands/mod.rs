pub(crate) mod errors;
pub(crate) mod migrate;
pub(crate) mod pages;
pub(crate) mod reset;
pub(crate) mod windows;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use siphon::{SyncWindow, SyncWindowColumn, SyncWindowEntity, SyncWindowModel};

/// Look up a window's row by its natural key.
pub(crate) async fn find_window(
    db: &DatabaseConnection,
    window: &SyncWindow,
) -> Result<Option<SyncWindowModel>, sea_orm::DbErr> {
    SyncWindowEntity::find()
        .filter(SyncWindowColumn::Element.eq(window.element.as_str()))
        .filter(SyncWindowColumn::Operation.eq(window.operation.as_str()))
        .filter(SyncWindowColumn::StartDate.eq(window.start_date))
        .filter(SyncWindowColumn::EndDate.eq(window.end_date))
        .one(db)
        .await
}
