//! Single-consumer loader task.
//!
//! The loader is the only writer of bulk data for a window: serializing
//! loads keeps "N rows land, then progress flips to Completed" atomic from
//! the controller's point of view. It never raises past its loop — every
//! failure becomes a progress status, optionally with an error-log entry.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::entity::page_status::PageStatus;
use crate::source::RowBatch;
use crate::store::{LoadSink, ProgressStore, StoreError};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{PageOutcome, PageResult, SyncWindow};
use super::worker::JoinGauge;

/// Tallies of what the loader did during one window run.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoaderStats {
    pub(crate) rows_loaded: u64,
    pub(crate) pages_loaded: u32,
    pub(crate) pages_hung: u32,
    pub(crate) pages_dead: u32,
    pub(crate) pages_stalled: u32,
    pub(crate) pages_failed: u32,
}

/// What the loader hands back when the result queue closes.
///
/// The sink rides along so the controller can reuse the connection for the
/// next window; the loader owned it exclusively while the pipeline ran.
pub(crate) struct LoaderReport {
    pub(crate) sink: Box<dyn LoadSink>,
    pub(crate) stats: LoaderStats,
}

pub(crate) struct Loader {
    window: SyncWindow,
    columns: Arc<[String]>,
    sink: Box<dyn LoadSink>,
    progress: Arc<dyn ProgressStore>,
    result_rx: mpsc::Receiver<PageResult>,
    gauge: Arc<JoinGauge>,
    on_progress: Option<Arc<ProgressCallback>>,
    stats: LoaderStats,
}

impl Loader {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        window: SyncWindow,
        columns: Arc<[String]>,
        sink: Box<dyn LoadSink>,
        progress: Arc<dyn ProgressStore>,
        result_rx: mpsc::Receiver<PageResult>,
        gauge: Arc<JoinGauge>,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> JoinHandle<LoaderReport> {
        let loader = Self {
            window,
            columns,
            sink,
            progress,
            result_rx,
            gauge,
            on_progress,
            stats: LoaderStats::default(),
        };
        tokio::spawn(loader.run())
    }

    async fn run(mut self) -> LoaderReport {
        debug!(window = %self.window.describe(), "Loader started");
        while let Some(result) = self.result_rx.recv().await {
            self.handle(result).await;
            self.gauge.done();
        }
        debug!(
            window = %self.window.describe(),
            pages = self.stats.pages_loaded,
            rows = self.stats.rows_loaded,
            "Loader finished"
        );
        LoaderReport {
            sink: self.sink,
            stats: self.stats,
        }
    }

    async fn handle(&mut self, result: PageResult) {
        let page = result.page;
        match result.outcome {
            PageOutcome::Rows(batch) => self.load_page(page, batch).await,
            PageOutcome::Transient(reason) => {
                self.stats.pages_hung += 1;
                self.record_status(page, PageStatus::Hung).await;
                emit(
                    self.on_progress.as_deref(),
                    SyncProgress::PageHung { page, reason },
                );
            }
            PageOutcome::Fatal(reason) => {
                self.stats.pages_failed += 1;
                self.record_error(page, &reason).await;
                self.record_status(page, PageStatus::ErrorFatal).await;
                emit(
                    self.on_progress.as_deref(),
                    SyncProgress::PageFailed { page, reason },
                );
            }
            PageOutcome::EmptyTerminal => {
                // Beyond the end of data; the page gets no progress record.
                debug!(page, "Discarding empty terminal page");
            }
        }
    }

    async fn load_page(&mut self, page: u32, batch: RowBatch) {
        let table = self.window.loader_table();
        let rows = batch.rows;

        match self.sink.bulk_load(&table, &self.columns, &rows).await {
            Ok(written) => self.mark_completed(page, written).await,
            Err(e) if e.is_reconnectable() => {
                // The failed attempt committed nothing, so the same batch is
                // safe to replay over a fresh connection — once.
                warn!(page, error = %e, "Bulk load hit infrastructure fault, reconnecting");
                let retried = match self.sink.reconnect().await {
                    Ok(()) => self.sink.bulk_load(&table, &self.columns, &rows).await,
                    Err(reconnect_err) => Err(reconnect_err),
                };
                match retried {
                    Ok(written) => self.mark_completed(page, written).await,
                    Err(e2) if e2.is_integrity() => self.mark_dead(page, e2).await,
                    Err(e2) => self.mark_stalled(page, e2).await,
                }
            }
            // Integrity faults and anything else the store rejects outright:
            // retrying cannot fix the data, so the page needs an operator.
            Err(e) => self.mark_dead(page, e).await,
        }
    }

    async fn mark_completed(&mut self, page: u32, rows: u64) {
        self.stats.pages_loaded += 1;
        self.stats.rows_loaded += rows;
        self.record_status(page, PageStatus::Completed).await;
        emit(
            self.on_progress.as_deref(),
            SyncProgress::PageLoaded { page, rows },
        );
    }

    async fn mark_dead(&mut self, page: u32, err: StoreError) {
        self.stats.pages_dead += 1;
        error!(page, error = %err, "Bulk load rejected, marking page dead");
        self.record_status(page, PageStatus::Dead).await;
        emit(
            self.on_progress.as_deref(),
            SyncProgress::PageDead {
                page,
                reason: err.to_string(),
            },
        );
    }

    async fn mark_stalled(&mut self, page: u32, err: StoreError) {
        self.stats.pages_stalled += 1;
        error!(page, error = %err, "Bulk load stalled after reconnect retry");
        self.record_error(page, &err.to_string()).await;
        self.record_status(page, PageStatus::ErrorTransient).await;
        emit(
            self.on_progress.as_deref(),
            SyncProgress::LoadStalled {
                page,
                reason: err.to_string(),
            },
        );
    }

    async fn record_status(&self, page: u32, status: PageStatus) {
        // A failed progress write leaves the page Pending; the next run's
        // pending set picks it up again, so losing the write costs a
        // re-fetch, never data.
        if let Err(e) = self.progress.set_page_status(&self.window, page, status).await {
            error!(page, %status, error = %e, "Failed to record page status");
        }
    }

    async fn record_error(&self, page: u32, message: &str) {
        if let Err(e) = self.progress.log_page_error(&self.window, page, message).await {
            error!(page, error = %e, "Failed to record error-log entry");
        }
    }
}
