use console::style;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use siphon::store::status_breakdown;
use siphon::{PageStatus, SyncPageColumn, SyncPageEntity, SyncWindow};

use super::find_window;

pub(crate) async fn handle_pages(
    database_url: &str,
    window: &SyncWindow,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = siphon::connect(database_url).await?;

    let Some(row) = find_window(&db, window).await? else {
        println!("No progress recorded for {}.", window.describe());
        return Ok(());
    };

    let pages = row
        .expected_pages
        .map_or_else(|| "unknown".to_string(), |p| p.to_string());
    println!(
        "{}  expected pages: {}  completed: {}",
        style(window.describe()).bold(),
        pages,
        if row.completed { "yes" } else { "no" },
    );

    let breakdown = status_breakdown(&db, row.id).await?;
    if breakdown.is_empty() {
        println!("No page records yet.");
        return Ok(());
    }

    for (status, count) in &breakdown {
        println!("  {:<16} {count}", status.to_string());
    }

    // Anything not completed is what an operator acts on; list those pages.
    let stuck = SyncPageEntity::find()
        .filter(SyncPageColumn::WindowId.eq(row.id))
        .filter(SyncPageColumn::Status.ne(PageStatus::Completed))
        .order_by_asc(SyncPageColumn::Page)
        .all(&db)
        .await?;

    if !stuck.is_empty() {
        println!();
        println!("Pages needing attention:");
        for page in stuck {
            println!("  page {:>6}  {}", page.page, page.status);
        }
    }

    Ok(())
}
