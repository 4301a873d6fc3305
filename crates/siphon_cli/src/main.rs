//! Siphon CLI - operator console for the sync progress store.

mod commands;
mod config;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use console::Term;
use siphon::SyncWindow;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "siphon")]
#[command(version)]
#[command(about = "Operator console for the siphon sync progress store")]
#[command(
    long_about = "Siphon bulk-synchronizes records from a paginated remote source into a \
relational store, tracking per-page progress durably. This console inspects \
and manages that progress state: which windows exist, which pages are dead or \
failed and why, and resetting windows for a fresh run."
)]
#[command(after_long_help = r#"EXAMPLES
    Apply the progress schema:
        $ siphon migrate up

    List every sync window and its completion state:
        $ siphon windows

    Inspect the page breakdown of one window:
        $ siphon pages Constituent update 2024-01-01 2024-01-31

    Show why pages of a window failed:
        $ siphon errors Constituent update 2024-01-01 2024-01-31

    Reset a window so the next run starts from scratch:
        $ siphon reset Constituent update 2024-01-01 2024-01-31 --yes

CONFIGURATION
    Siphon reads configuration from:
      1. ~/.config/siphon/config.toml (or $XDG_CONFIG_HOME/siphon/config.toml)
      2. ./siphon.toml
      3. Environment variables (SIPHON_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    SIPHON_DATABASE_URL    Progress store connection string
                           (default: ~/.local/state/siphon/siphon.db)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// List all sync windows and their completion state
    Windows,
    /// Show the per-page status breakdown for one window
    Pages {
        #[command(flatten)]
        selector: WindowSelector,
    },
    /// Show the error log for one window
    Errors {
        #[command(flatten)]
        selector: WindowSelector,
        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
    },
    /// Clear a window's page records and completion for a fresh run
    Reset {
        #[command(flatten)]
        selector: WindowSelector,
        /// Skip the confirmation requirement
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Identifies one sync window by its natural key.
#[derive(Debug, Clone, Args)]
struct WindowSelector {
    /// Data element of the window (e.g., Constituent)
    element: String,
    /// Operation name (e.g., update)
    operation: String,
    /// Window start date (YYYY-MM-DD)
    start_date: NaiveDate,
    /// Window end date (YYYY-MM-DD)
    end_date: NaiveDate,
}

impl WindowSelector {
    fn window(&self) -> SyncWindow {
        SyncWindow::new(
            self.element.clone(),
            self.operation.clone(),
            self.start_date,
            self.end_date,
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when output is not a terminal; interactive use
    // gets plain command output.
    if !Term::stdout().is_term() {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("siphon=info,siphon_cli=info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();
    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("failed to determine database URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Windows => {
            commands::windows::handle_windows(&database_url).await?;
        }
        Commands::Pages { selector } => {
            commands::pages::handle_pages(&database_url, &selector.window()).await?;
        }
        Commands::Errors { selector, limit } => {
            commands::errors::handle_errors(&database_url, &selector.window(), limit).await?;
        }
        Commands::Reset { selector, yes } => {
            commands::reset::handle_reset(&database_url, &selector.window(), yes).await?;
        }
    }

    Ok(())
}
