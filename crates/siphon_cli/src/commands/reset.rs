use console::style;
use siphon::{ProgressStore, SeaOrmProgressStore, SyncWindow};

pub(crate) async fn handle_reset(
    database_url: &str,
    window: &SyncWindow,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !yes {
        eprintln!(
            "This permanently deletes all page records and the error log for {}.",
            style(window.describe()).bold()
        );
        eprintln!("Re-run with --yes to confirm.");
        return Ok(());
    }

    let db = siphon::connect(database_url).await?;
    let store = SeaOrmProgressStore::new(db);
    store.reset(window).await?;
    println!("{} reset; the next run starts fresh.", window.describe());
    Ok(())
}
