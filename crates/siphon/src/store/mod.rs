//! Store contracts and their sea-orm implementations.
//!
//! The pipeline sees the store only through two narrow traits:
//! [`ProgressStore`] for durable per-(window, page) status records and
//! [`LoadSink`] for appending row batches to loader tables. The controller
//! and fetch workers never touch the sink; the loader never touches anything
//! else.

mod errors;
mod load;
mod progress;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::entity::page_status::PageStatus;
use crate::source::Row;
use crate::sync::SyncWindow;

pub use errors::{Result, StoreError};
pub use load::SeaOrmLoadSink;
pub use progress::{SeaOrmProgressStore, list_windows, recent_errors, status_breakdown};

/// Expected page count and completion flag for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    /// Expected page count; `None` until counted or discovered.
    pub expected_pages: Option<u32>,
    /// Whether the window was finalized by a previous run.
    pub completed: bool,
}

/// Durable per-(window, page) progress records.
///
/// Shared by the controller (reads, pending-set computation) and the loader
/// (status writes after each attempt). Implementations must make every write
/// durable before returning: resumability depends on it.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the window's status, creating its record on first reference.
    async fn get_status(&self, window: &SyncWindow) -> Result<WindowStatus>;

    /// Record the window's expected page count once known.
    async fn set_expected_pages(&self, window: &SyncWindow, pages: u32) -> Result<()>;

    /// Pages of the window currently in the given status.
    async fn get_pages(&self, window: &SyncWindow, status: PageStatus) -> Result<BTreeSet<u32>>;

    /// Record the outcome of a page attempt (upsert on (window, page)).
    async fn set_page_status(&self, window: &SyncWindow, page: u32, status: PageStatus)
    -> Result<()>;

    /// Append a failure description to the error log for (window, page).
    async fn log_page_error(&self, window: &SyncWindow, page: u32, message: &str) -> Result<()>;

    /// Whether every expected page of the window is completed.
    ///
    /// Returns false while the expected page count is unknown.
    async fn evaluate_completeness(&self, window: &SyncWindow) -> Result<bool>;

    /// Mark the window complete. Idempotent; safe to call twice.
    async fn finalize(&self, window: &SyncWindow) -> Result<()>;

    /// Clear the window's page records and completion for a fresh run.
    async fn reset(&self, window: &SyncWindow) -> Result<()>;
}

/// Append-only sink for bulk-loading row batches into loader tables.
///
/// The loader task owns the sink exclusively; `reconnect` replaces the
/// sink's own connection without coordination since no other component holds
/// it. One call loads one page inside one transaction, so a failed attempt
/// commits nothing and retrying the same batch is safe.
#[async_trait]
pub trait LoadSink: Send + Sync {
    /// Append `rows` to `table` with the given column order.
    ///
    /// Returns the number of rows written. Must be atomic per call.
    async fn bulk_load(&mut self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64>;

    /// Replace the sink's connection after an infrastructure fault.
    async fn reconnect(&mut self) -> Result<()>;
}
