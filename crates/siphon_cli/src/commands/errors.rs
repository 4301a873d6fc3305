use console::style;
use siphon::SyncWindow;
use siphon::store::recent_errors;

use super::find_window;

pub(crate) async fn handle_errors(
    database_url: &str,
    window: &SyncWindow,
    limit: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = siphon::connect(database_url).await?;

    let Some(row) = find_window(&db, window).await? else {
        println!("No progress recorded for {}.", window.describe());
        return Ok(());
    };

    let errors = recent_errors(&db, row.id, limit).await?;
    if errors.is_empty() {
        println!("No errors logged for {}.", window.describe());
        return Ok(());
    }

    println!("{}", style(window.describe()).bold());
    for entry in errors {
        println!(
            "  {}  page {:>6}  {}",
            entry.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            entry.page,
            entry.message.lines().next().unwrap_or(entry.message.as_str()),
        );
    }

    Ok(())
}
