//! Initial migration to create the progress-tracking schema.
//!
//! Loader tables (one per synced element) are owned by the target store and
//! are not created here.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_sync_windows(manager).await?;
        self.create_sync_pages(manager).await?;
        self.create_sync_errors(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncErrors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncPages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncWindows::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_sync_windows(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncWindows::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncWindows::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Identity
                    .col(ColumnDef::new(SyncWindows::Element).string().not_null())
                    .col(ColumnDef::new(SyncWindows::Operation).string().not_null())
                    .col(ColumnDef::new(SyncWindows::StartDate).date().not_null())
                    .col(ColumnDef::new(SyncWindows::EndDate).date().not_null())
                    // Progress
                    .col(ColumnDef::new(SyncWindows::ExpectedPages).integer().null())
                    .col(
                        ColumnDef::new(SyncWindows::Completed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // Timestamps
                    .col(
                        ColumnDef::new(SyncWindows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncWindows::FinalizedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key: one window per (element, operation, date range)
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_windows_identity")
                    .table(SyncWindows::Table)
                    .col(SyncWindows::Element)
                    .col(SyncWindows::Operation)
                    .col(SyncWindows::StartDate)
                    .col(SyncWindows::EndDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_pages(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncPages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncPages::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncPages::WindowId).uuid().not_null())
                    .col(ColumnDef::new(SyncPages::Page).integer().not_null())
                    .col(ColumnDef::new(SyncPages::Status).string().not_null())
                    .col(
                        ColumnDef::new(SyncPages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_pages_window_id")
                            .from(SyncPages::Table, SyncPages::WindowId)
                            .to(SyncWindows::Table, SyncWindows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One progress record per (window, page); status writes are upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_pages_window_page")
                    .table(SyncPages::Table)
                    .col(SyncPages::WindowId)
                    .col(SyncPages::Page)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The controller's pending/hung scans filter by status
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_pages_window_status")
                    .table(SyncPages::Table)
                    .col(SyncPages::WindowId)
                    .col(SyncPages::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_errors(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncErrors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncErrors::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncErrors::WindowId).uuid().not_null())
                    .col(ColumnDef::new(SyncErrors::Page).integer().not_null())
                    .col(ColumnDef::new(SyncErrors::Message).text().not_null())
                    .col(
                        ColumnDef::new(SyncErrors::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_errors_window_id")
                            .from(SyncErrors::Table, SyncErrors::WindowId)
                            .to(SyncWindows::Table, SyncWindows::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_errors_window_page")
                    .table(SyncErrors::Table)
                    .col(SyncErrors::WindowId)
                    .col(SyncErrors::Page)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum SyncWindows {
    Table,
    Id,
    Element,
    Operation,
    StartDate,
    EndDate,
    ExpectedPages,
    Completed,
    CreatedAt,
    FinalizedAt,
}

#[derive(DeriveIden)]
enum SyncPages {
    Table,
    Id,
    WindowId,
    Page,
    Status,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SyncErrors {
    Table,
    Id,
    WindowId,
    Page,
    Message,
    OccurredAt,
}
