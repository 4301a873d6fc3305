//! Fetch gateway contract for the remote paginated source.

use async_trait::async_trait;

use crate::sync::{FetchStrategy, SyncWindow};

use super::errors::Result;

/// One record as an ordered sequence of field values.
///
/// Values are the source's textual representation; an empty string means the
/// field was absent (the load sink stores it as NULL).
pub type Row = Vec<String>;

/// One page of rows fetched from the remote source.
///
/// Row order from the source is preserved through to the load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowBatch {
    /// The decoded rows, in source order.
    pub rows: Vec<Row>,
}

impl RowBatch {
    /// Create a batch from decoded rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Number of rows in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    ///
    /// Under the filtered strategy an empty batch is the end-of-data signal.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait for clients of the remote paginated source.
///
/// Implementors wrap the source's wire protocol and session lifecycle;
/// neither is visible to the pipeline. Fetch workers hold the gateway behind
/// an `Arc` and call it concurrently, so implementations must be internally
/// synchronized.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Convert every failure to a [`SourceError`](super::SourceError) so the
///   worker's classification policy applies
/// - Keep rows in source order within a page
/// - Treat the window's date range as the filter payload for the filtered
///   strategy
#[async_trait]
pub trait SourceGateway: Send + Sync {
    /// Count the records the window covers for (element, operation).
    ///
    /// Only meaningful for elements that support counted pagination.
    async fn count(&self, window: &SyncWindow) -> Result<u64>;

    /// Fetch one page of rows for the window.
    ///
    /// `fields` determines both the requested fields and their order within
    /// each returned row. Pages are 1-indexed.
    async fn fetch(
        &self,
        window: &SyncWindow,
        strategy: FetchStrategy,
        fields: &[String],
        page: u32,
        page_size: u32,
    ) -> Result<RowBatch>;
}
