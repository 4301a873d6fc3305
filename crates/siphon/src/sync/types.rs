//! Core sync types and constants.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::source::RowBatch;

/// Default number of parallel fetch workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default rows per fetched page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Capacity of the task queue between the controller and the worker pool.
///
/// Bounded so enumeration of a large window cannot buffer the whole pending
/// set in memory; the controller blocks once workers fall this far behind.
pub const TASK_QUEUE_CAPACITY: usize = 64;

/// Capacity of the result queue between the worker pool and the loader.
///
/// This bound is the backpressure mechanism: a slow store can only fall this
/// many fetched pages behind before the workers stop pulling new tasks.
pub const RESULT_QUEUE_CAPACITY: usize = 16;

/// Pages probed per wave while discovering a filtered window's length.
pub const DEFAULT_DISCOVERY_WAVE: u32 = 8;

/// A synchronization scope: one (element, operation) pair over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncWindow {
    /// Remote data element to sync.
    pub element: String,
    /// Sync operation name (insert, update, delete, ...).
    pub operation: String,
    /// Inclusive start date.
    pub start_date: NaiveDate,
    /// Inclusive end date.
    pub end_date: NaiveDate,
}

impl SyncWindow {
    /// Create a window.
    pub fn new(
        element: impl Into<String>,
        operation: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            element: element.into(),
            operation: operation.into(),
            start_date,
            end_date,
        }
    }

    /// Name of the loader table rows of this window land in.
    pub fn loader_table(&self) -> String {
        format!("{}_loader", self.element.to_ascii_lowercase())
    }

    /// Compact human-readable identity for logs and errors.
    pub fn describe(&self) -> String {
        format!(
            "{}/{} {}..{}",
            self.element, self.operation, self.start_date, self.end_date
        )
    }
}

/// How pages of a window are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStrategy {
    /// Page count derived upfront from a record count.
    Counted,
    /// Open-ended filtered querying; an empty page is the only end signal.
    Filtered,
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategy::Counted => write!(f, "counted"),
            FetchStrategy::Filtered => write!(f, "filtered"),
        }
    }
}

/// One unit of fetch work: a single page of a window.
///
/// Consumed exactly once by a worker; the controller re-creates the task if
/// the page is re-driven.
#[derive(Debug, Clone)]
pub struct PageTask {
    /// The window this page belongs to.
    pub window: SyncWindow,
    /// Page number, 1-indexed.
    pub page: u32,
    /// Strategy the page is fetched under.
    pub strategy: FetchStrategy,
    /// Ordered field list; shared across all tasks of the window.
    pub fields: Arc<[String]>,
}

/// Outcome of one `PageTask`, produced by a worker.
#[derive(Debug)]
pub struct PageResult {
    /// Page number the outcome belongs to.
    pub page: u32,
    /// The classified outcome.
    pub outcome: PageOutcome,
}

/// Classified outcome of a page fetch.
#[derive(Debug)]
pub enum PageOutcome {
    /// Decoded rows, in source order.
    Rows(RowBatch),
    /// Transport-layer failure; the page becomes hung and is retried once.
    Transient(String),
    /// Unhandled fetch/decode failure; reported, not retried.
    Fatal(String),
    /// Zero rows under the filtered strategy: end of data.
    EmptyTerminal,
}

/// One (element, operation) pair in a batch plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncOp {
    /// Remote data element.
    pub element: String,
    /// Sync operation name.
    pub operation: String,
}

impl SyncOp {
    /// Create a plan entry.
    pub fn new(element: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            operation: operation.into(),
        }
    }

    /// The window this op covers for a given date range.
    pub fn window(&self, start_date: NaiveDate, end_date: NaiveDate) -> SyncWindow {
        SyncWindow::new(
            self.element.clone(),
            self.operation.clone(),
            start_date,
            end_date,
        )
    }
}

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Number of parallel fetch workers.
    pub workers: usize,
    /// Rows requested per page.
    pub page_size: u32,
    /// Pages probed per wave during filtered discovery.
    pub discovery_wave: u32,
    /// Fetch rate limit in requests per second, if any.
    pub rate_limit_rps: Option<u32>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            page_size: DEFAULT_PAGE_SIZE,
            discovery_wave: DEFAULT_DISCOVERY_WAVE,
            rate_limit_rps: None,
        }
    }
}

/// What `run_window` left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    /// The window was finalized by an earlier run; nothing was fetched.
    AlreadyComplete,
    /// Every expected page completed and the window was finalized.
    Finalized {
        /// Expected page count of the window.
        pages: u32,
    },
    /// The window stays open; some pages did not complete.
    Incomplete {
        /// Expected page count, if known.
        pages: Option<u32>,
        /// Pages currently completed.
        completed: u32,
        /// Pages hung on transient fetch failures.
        hung: u32,
        /// Pages dead on integrity faults.
        dead: u32,
        /// Pages stalled on store infrastructure.
        error_transient: u32,
        /// Pages failed on unhandled fetch errors.
        error_fatal: u32,
    },
}

impl WindowOutcome {
    /// Whether the window ended finalized (now or previously).
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::AlreadyComplete | Self::Finalized { .. })
    }
}
