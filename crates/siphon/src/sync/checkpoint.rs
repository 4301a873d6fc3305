//! Durable batch checkpoint for multi-window jobs.
//!
//! A batch job runs many (element, operation) windows over one date range.
//! The checkpoint file records, per op, the last page enqueued and whether
//! the window finalized, so a restarted job skips straight to the first
//! unfinished window instead of replaying the whole plan. Page-level
//! resumption inside a window stays with the progress store; the checkpoint
//! only positions the batch.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SyncError;
use super::types::SyncOp;

/// Per-(element, operation) position within a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCheckpoint {
    /// Highest page enqueued for the op's window.
    pub last_enqueued_page: u32,
    /// Whether the window was finalized.
    pub finalized: bool,
}

/// Durable position of one batch job, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    start_date: NaiveDate,
    end_date: NaiveDate,
    entries: BTreeMap<String, OpCheckpoint>,
}

impl BatchCheckpoint {
    /// Create an empty checkpoint for a date range.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            entries: BTreeMap::new(),
        }
    }

    fn key(op: &SyncOp) -> String {
        format!("{}:{}", op.element, op.operation)
    }

    /// Load a checkpoint from disk.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let data = fs::read_to_string(path)
            .map_err(|e| SyncError::checkpoint(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| SyncError::checkpoint(format!("parse {}: {e}", path.display())))
    }

    /// Load the checkpoint for this date range, or start fresh.
    ///
    /// A checkpoint for a different range belongs to another batch and is
    /// ignored rather than misapplied.
    pub fn load_or_new(
        path: &Path,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::new(start_date, end_date));
        }
        let loaded = Self::load(path)?;
        if loaded.start_date != start_date || loaded.end_date != end_date {
            tracing::warn!(
                path = %path.display(),
                "Checkpoint covers a different date range, starting fresh"
            );
            return Ok(Self::new(start_date, end_date));
        }
        Ok(loaded)
    }

    /// Whether the op's window was already finalized by this batch.
    pub fn is_finalized(&self, op: &SyncOp) -> bool {
        self.entries
            .get(&Self::key(op))
            .is_some_and(|e| e.finalized)
    }

    /// Position recorded for an op, if any.
    pub fn get(&self, op: &SyncOp) -> Option<OpCheckpoint> {
        self.entries.get(&Self::key(op)).copied()
    }

    /// Record an op's position after its window ran.
    pub fn record(&mut self, op: &SyncOp, last_enqueued_page: u32, finalized: bool) {
        self.entries.insert(
            Self::key(op),
            OpCheckpoint {
                last_enqueued_page,
                finalized,
            },
        );
    }

    /// Persist the checkpoint (write-then-rename so a crash mid-write never
    /// leaves a truncated file).
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::checkpoint(format!("serialize: {e}")))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)
            .map_err(|e| SyncError::checkpoint(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|e| SyncError::checkpoint(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}
