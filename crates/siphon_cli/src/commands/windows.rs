use siphon::store::list_windows;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct WindowRow {
    #[tabled(rename = "ELEMENT")]
    element: String,
    #[tabled(rename = "OPERATION")]
    operation: String,
    #[tabled(rename = "RANGE")]
    range: String,
    #[tabled(rename = "PAGES")]
    pages: String,
    #[tabled(rename = "STATE")]
    state: String,
}

pub(crate) async fn handle_windows(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = siphon::connect(database_url).await?;
    let windows = list_windows(&db).await?;

    if windows.is_empty() {
        println!("No sync windows recorded.");
        return Ok(());
    }

    let rows: Vec<WindowRow> = windows
        .into_iter()
        .map(|w| WindowRow {
            element: w.element,
            operation: w.operation,
            range: format!("{}..{}", w.start_date, w.end_date),
            pages: w
                .expected_pages
                .map_or_else(|| "?".to_string(), |p| p.to_string()),
            state: if w.completed {
                match w.finalized_at {
                    Some(at) => format!("completed {}", at.date_naive()),
                    None => "completed".to_string(),
                }
            } else {
                "open".to_string()
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
