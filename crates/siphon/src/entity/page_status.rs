//! Page status enum for per-page progress records.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of one page within a sync window.
///
/// A page moves from `Pending` to exactly one of the other statuses per
/// attempt. Only `Completed` pages are excluded when a window is re-run;
/// every other status is re-enumerated by the next invocation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PageStatus {
    /// Enqueued for fetching; no attempt has resolved yet.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Rows landed in the loader table and the record flipped in sequence.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Last fetch failed transiently; eligible for one in-run retry.
    #[sea_orm(string_value = "hung")]
    Hung,
    /// Bulk load rejected by the store on a data fault; needs an operator.
    #[sea_orm(string_value = "dead")]
    Dead,
    /// Load failed on store infrastructure even after a reconnect retry.
    #[sea_orm(string_value = "error_transient")]
    ErrorTransient,
    /// Fetch or decode failed for an unknown reason; see the error log.
    #[sea_orm(string_value = "error_fatal")]
    ErrorFatal,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Pending => write!(f, "pending"),
            PageStatus::Completed => write!(f, "completed"),
            PageStatus::Hung => write!(f, "hung"),
            PageStatus::Dead => write!(f, "dead"),
            PageStatus::ErrorTransient => write!(f, "error_transient"),
            PageStatus::ErrorFatal => write!(f, "error_fatal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pending() {
        assert_eq!(PageStatus::default(), PageStatus::Pending);
    }

    #[test]
    fn display_outputs_expected_strings() {
        assert_eq!(PageStatus::Completed.to_string(), "completed");
        assert_eq!(PageStatus::Hung.to_string(), "hung");
        assert_eq!(PageStatus::ErrorFatal.to_string(), "error_fatal");
    }
}
