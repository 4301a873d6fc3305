//! Progress reporting types for sync operations.

use super::types::FetchStrategy;

/// Progress events emitted while a window runs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A window run began.
    WindowStarted {
        /// Window identity (element/operation and date range).
        window: String,
        /// Strategy selected for the window.
        strategy: FetchStrategy,
        /// Expected pages, if already known from a prior run.
        expected_pages: Option<u32>,
    },

    /// The source reported its record count for a counted window.
    CountReceived {
        /// Total records the window covers.
        records: u64,
        /// Derived page count.
        pages: u32,
    },

    /// A worker fetched a page of rows.
    PageFetched {
        /// Page number.
        page: u32,
        /// Rows in the batch.
        rows: usize,
    },

    /// The loader committed a page into the loader table.
    PageLoaded {
        /// Page number.
        page: u32,
        /// Rows written.
        rows: u64,
    },

    /// A page failed transiently and was marked hung.
    PageHung {
        /// Page number.
        page: u32,
        /// Failure description.
        reason: String,
    },

    /// A page's bulk load was rejected on a data fault and marked dead.
    PageDead {
        /// Page number.
        page: u32,
        /// Failure description.
        reason: String,
    },

    /// A page failed fatally during fetch/decode.
    PageFailed {
        /// Page number.
        page: u32,
        /// Failure description.
        reason: String,
    },

    /// A page's load stalled on store infrastructure after a reconnect retry.
    LoadStalled {
        /// Page number.
        page: u32,
        /// Failure description.
        reason: String,
    },

    /// A worker observed the first empty page of a filtered window.
    EndOfData {
        /// The empty page number.
        first_empty_page: u32,
    },

    /// Filtered discovery finished and the page count was recorded.
    DiscoveryComplete {
        /// Discovered page count.
        pages: u32,
    },

    /// Hung pages are being re-driven through the pipeline.
    RetryingHungPages {
        /// Number of pages in the retry pass.
        count: usize,
    },

    /// The window completed and was finalized.
    WindowFinalized {
        /// Window identity.
        window: String,
        /// Expected page count.
        pages: u32,
    },

    /// The window stays open with unfinished pages.
    WindowIncomplete {
        /// Window identity.
        window: String,
        /// Pages completed so far.
        completed: u32,
        /// Expected pages, if known.
        pages: Option<u32>,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// Convenience to avoid repetitive `if let Some(cb) = ...` at call sites.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_callback_invokes_it() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(Some(&callback), SyncProgress::PageFetched { page: 1, rows: 100 });
        emit(Some(&callback), SyncProgress::PageLoaded { page: 1, rows: 100 });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_without_callback_is_a_noop() {
        emit(None, SyncProgress::DiscoveryComplete { pages: 3 });
    }

    #[test]
    fn events_capture_their_fields() {
        let event = SyncProgress::WindowStarted {
            window: "Widget/update 2024-01-01..2024-01-31".to_string(),
            strategy: FetchStrategy::Counted,
            expected_pages: Some(3),
        };
        let debug_str = format!("{event:?}");
        assert!(debug_str.contains("Widget/update"));
        assert!(debug_str.contains("Counted"));
    }
}
