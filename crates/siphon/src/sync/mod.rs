//! The sync pipeline: controller, fetch worker pool, loader, and strategy
//! selection.
//!
//! # Module Structure
//!
//! - `types` - core types: `SyncWindow`, `PageTask`, `PageResult`,
//!   `SyncOptions`, `WindowOutcome`, constants
//! - `progress` - progress reporting: `SyncProgress`, `ProgressCallback`,
//!   `emit()`
//! - `strategy` - pagination strategy selection
//! - [`checkpoint`] - durable batch checkpoints for multi-window jobs
//! - `worker` / `loader` / `controller` - the pipeline itself
//!
//! # Example
//!
//! ```ignore
//! use siphon::sync::{SyncController, SyncOptions, SyncWindow};
//!
//! let mut controller = SyncController::new(gateway, progress, sink, catalog);
//! let window = SyncWindow::new("Widget", "update", start, end);
//! let outcome = controller.run_window(&window).await?;
//! ```

pub mod checkpoint;
mod controller;
mod loader;
mod progress;
mod strategy;
mod types;
mod worker;

use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

// Re-export core types
pub use types::{
    FetchStrategy, PageOutcome, PageResult, PageTask, SyncOp, SyncOptions, SyncWindow,
    WindowOutcome,
};

// Re-export constants
pub use types::{
    DEFAULT_DISCOVERY_WAVE, DEFAULT_PAGE_SIZE, DEFAULT_WORKERS, RESULT_QUEUE_CAPACITY,
    TASK_QUEUE_CAPACITY,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

pub use controller::SyncController;
pub use strategy::select_strategy;

/// Structural errors surfaced by the controller.
///
/// Per-page failures never appear here; they are absorbed into progress
/// state. `SyncError` means the run itself could not proceed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Neither fetch strategy is available for (element, operation).
    #[error("no compatible operation: {operation} on {element}")]
    NoCompatibleOperation { element: String, operation: String },

    /// The gateway failed outside the per-page pipeline (e.g. `count()`).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The progress store failed outside the per-page pipeline.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch checkpoint file could not be read or written.
    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    /// The pipeline shut down unexpectedly mid-run.
    #[error("pipeline stalled: {message}")]
    Pipeline { message: String },
}

impl SyncError {
    /// Create a no-compatible-operation error for a window.
    pub(crate) fn no_compatible_operation(window: &SyncWindow) -> Self {
        Self::NoCompatibleOperation {
            element: window.element.clone(),
            operation: window.operation.clone(),
        }
    }

    /// Create a checkpoint error.
    pub(crate) fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    /// Create a pipeline error.
    pub(crate) fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }
}
