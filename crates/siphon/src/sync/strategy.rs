//! Pagination strategy selection.

use crate::source::ElementCatalog;

use super::types::{FetchStrategy, SyncWindow};
use super::SyncError;

/// Pick the fetch strategy for a window from the element's capability set.
///
/// Filtered access is preferred when both strategies are available — it
/// answers with lower latency on the observed source — unless the element is
/// on the force-counted override list. An element forced onto counted
/// pagination that does not support it has no usable strategy: filtering is
/// known to return wrong results for it, and wrong data is worse than no
/// data.
///
/// Fails with [`SyncError::NoCompatibleOperation`] before any task is
/// enqueued when no strategy fits.
pub fn select_strategy(
    catalog: &ElementCatalog,
    window: &SyncWindow,
) -> Result<FetchStrategy, SyncError> {
    let caps = catalog
        .get(&window.element)
        .ok_or_else(|| SyncError::no_compatible_operation(window))?;
    let support = caps
        .operations
        .get(&window.operation)
        .ok_or_else(|| SyncError::no_compatible_operation(window))?;

    let forced = catalog.is_force_counted(&window.element);
    match (support.counted, support.filtered, forced) {
        (true, _, true) => Ok(FetchStrategy::Counted),
        (false, _, true) => Err(SyncError::no_compatible_operation(window)),
        (_, true, false) => Ok(FetchStrategy::Filtered),
        (true, false, false) => Ok(FetchStrategy::Counted),
        (false, false, false) => Err(SyncError::no_compatible_operation(window)),
    }
}
