//! Fetch worker pool.
//!
//! Workers pull `PageTask`s from a shared bounded queue, call the gateway,
//! classify the outcome, and post exactly one `PageResult` per task — even on
//! failure. That one-for-one guarantee is what makes the controller's join
//! barrier terminate. Workers never touch the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::source::{FailureClass, FetchRateLimiter, SourceGateway};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{FetchStrategy, PageOutcome, PageResult, PageTask};

/// Sentinel for "no empty page observed yet".
const NO_TERMINAL: u32 = u32::MAX;

/// Out-of-band end-of-data signal from workers to the controller.
///
/// Workers record every empty page they observe; the minimum wins, since the
/// lowest empty page index is the one that bounds the window. The controller
/// polls this between discovery waves so it stops enqueueing pages it would
/// only discard.
#[derive(Debug)]
pub(crate) struct EndOfData {
    first_empty: AtomicU32,
}

impl EndOfData {
    pub(crate) fn new() -> Self {
        Self {
            first_empty: AtomicU32::new(NO_TERMINAL),
        }
    }

    /// Record an observed empty page.
    pub(crate) fn record(&self, page: u32) {
        self.first_empty.fetch_min(page, Ordering::AcqRel);
    }

    /// The lowest empty page observed so far, if any.
    pub(crate) fn first_empty(&self) -> Option<u32> {
        match self.first_empty.load(Ordering::Acquire) {
            NO_TERMINAL => None,
            page => Some(page),
        }
    }
}

/// Join barrier between the controller and the pipeline.
///
/// The controller adds one per enqueued task; the loader signals one per
/// fully processed result. `wait_idle` resolves only when the task queue has
/// drained AND every dispatched task's result has been loaded, which is the
/// barrier that keeps a window from being evaluated while results are still
/// in flight.
#[derive(Debug)]
pub(crate) struct JoinGauge {
    in_flight: AtomicUsize,
    idle: Notify,
}

impl JoinGauge {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Account for a newly enqueued task.
    pub(crate) fn add(&self, n: usize) {
        self.in_flight.fetch_add(n, Ordering::AcqRel);
    }

    /// Account for a fully processed result.
    pub(crate) fn done(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Wait until no task is in flight.
    pub(crate) async fn wait_idle(&self) {
        loop {
            // Register interest before re-checking so a concurrent `done`
            // cannot slip between the check and the await.
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Everything one worker needs; cloned per pool member.
pub(crate) struct WorkerContext {
    pub(crate) gateway: Arc<dyn SourceGateway>,
    pub(crate) task_rx: Arc<Mutex<mpsc::Receiver<PageTask>>>,
    pub(crate) result_tx: mpsc::Sender<PageResult>,
    pub(crate) limiter: Option<FetchRateLimiter>,
    pub(crate) end_of_data: Arc<EndOfData>,
    pub(crate) page_size: u32,
    pub(crate) on_progress: Option<Arc<ProgressCallback>>,
}

impl Clone for WorkerContext {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            task_rx: Arc::clone(&self.task_rx),
            result_tx: self.result_tx.clone(),
            limiter: self.limiter.clone(),
            end_of_data: Arc::clone(&self.end_of_data),
            page_size: self.page_size,
            on_progress: self.on_progress.clone(),
        }
    }
}

/// Handles of the spawned pool.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers over the shared context.
    ///
    /// Each worker holds its own clone of the result sender; when the last
    /// worker exits, the result channel closes and the loader drains out.
    pub(crate) fn spawn(count: usize, ctx: WorkerContext) -> Self {
        let count = count.max(1);
        let mut handles = Vec::with_capacity(count);
        for worker_id in 0..count {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(run_worker(worker_id, ctx)));
        }
        // The original context's sender must not outlive the spawn call,
        // or the result channel never closes.
        drop(ctx);
        Self { handles }
    }

    /// Wait for every worker to exit.
    pub(crate) async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Fetch worker panicked");
            }
        }
    }
}

async fn run_worker(worker_id: usize, ctx: WorkerContext) {
    debug!(worker_id, "Fetch worker started");
    loop {
        // Hold the receiver lock only for the dequeue; idle workers queue up
        // on the mutex, each taking one task at a time.
        let task = { ctx.task_rx.lock().await.recv().await };
        let Some(task) = task else {
            break;
        };

        if let Some(limiter) = &ctx.limiter {
            limiter.wait().await;
        }

        let outcome = fetch_one(&ctx, &task).await;
        let result = PageResult {
            page: task.page,
            outcome,
        };
        if ctx.result_tx.send(result).await.is_err() {
            // Loader gone; nothing left to do with fetched pages.
            warn!(worker_id, "Result queue closed, worker exiting");
            break;
        }
    }
    debug!(worker_id, "Fetch worker finished");
}

/// Perform one fetch and classify it. Never returns an error: every failure
/// becomes a classified outcome so the page's result always reaches the
/// loader.
async fn fetch_one(ctx: &WorkerContext, task: &PageTask) -> PageOutcome {
    let fetched = ctx
        .gateway
        .fetch(
            &task.window,
            task.strategy,
            &task.fields,
            task.page,
            ctx.page_size,
        )
        .await;

    match fetched {
        Ok(batch) if task.strategy == FetchStrategy::Filtered && batch.is_empty() => {
            debug!(page = task.page, "Empty page: end of data");
            ctx.end_of_data.record(task.page);
            emit(
                ctx.on_progress.as_deref(),
                SyncProgress::EndOfData {
                    first_empty_page: task.page,
                },
            );
            PageOutcome::EmptyTerminal
        }
        Ok(batch) => {
            debug!(page = task.page, rows = batch.len(), "Fetched page");
            emit(
                ctx.on_progress.as_deref(),
                SyncProgress::PageFetched {
                    page: task.page,
                    rows: batch.len(),
                },
            );
            PageOutcome::Rows(batch)
        }
        Err(e) => match e.class() {
            FailureClass::Transient => {
                warn!(page = task.page, error = %e, "Transient fetch failure");
                PageOutcome::Transient(e.to_string())
            }
            FailureClass::Fatal => {
                error!(page = task.page, error = %e, "Fatal fetch failure");
                PageOutcome::Fatal(e.to_string())
            }
        },
    }
}
