//! Sync controller: window lifecycle orchestration.
//!
//! `run_window` decomposes a window into page tasks, dispatches them across
//! the worker pool, waits for the join barrier, re-drives hung pages once,
//! and asks the store to evaluate completeness. Per-page failures are
//! absorbed into progress state; only structural errors fail the call.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entity::page_status::PageStatus;
use crate::source::{ElementCatalog, FetchRateLimiter, SourceGateway};
use crate::store::{LoadSink, ProgressStore, WindowStatus};

use super::SyncError;
use super::checkpoint::BatchCheckpoint;
use super::loader::{Loader, LoaderReport};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::strategy::select_strategy;
use super::types::{
    FetchStrategy, PageTask, RESULT_QUEUE_CAPACITY, SyncOp, SyncOptions, SyncWindow,
    TASK_QUEUE_CAPACITY, WindowOutcome,
};
use super::worker::{EndOfData, JoinGauge, WorkerContext, WorkerPool};

/// Orchestrates window runs over a gateway, a progress store, and a load
/// sink.
///
/// The controller is the only component that sees all three collaborators;
/// workers see the gateway, the loader sees the stores, and neither crosses
/// over.
pub struct SyncController {
    gateway: Arc<dyn SourceGateway>,
    progress: Arc<dyn ProgressStore>,
    sink: Option<Box<dyn LoadSink>>,
    catalog: ElementCatalog,
    options: SyncOptions,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl SyncController {
    /// Create a controller with default options.
    pub fn new(
        gateway: Arc<dyn SourceGateway>,
        progress: Arc<dyn ProgressStore>,
        sink: Box<dyn LoadSink>,
        catalog: ElementCatalog,
    ) -> Self {
        Self {
            gateway,
            progress,
            sink: Some(sink),
            catalog,
            options: SyncOptions::default(),
            on_progress: None,
        }
    }

    /// Override pipeline tuning options.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Run one window to completion or to a durable stopping point.
    ///
    /// Safe to re-invoke after a crash: only non-completed pages are
    /// enqueued, and already-finalized windows short-circuit without
    /// building a pipeline.
    pub async fn run_window(&mut self, window: &SyncWindow) -> Result<WindowOutcome, SyncError> {
        self.run_window_inner(window).await.map(|(outcome, _)| outcome)
    }

    /// Run a batch plan over one date range, checkpointing between windows.
    ///
    /// With a checkpoint path, a restarted batch skips ops whose windows
    /// already finalized and re-enters the first unfinished one, where the
    /// progress store governs page-level resumption.
    pub async fn run_batch(
        &mut self,
        plan: &[SyncOp],
        start_date: NaiveDate,
        end_date: NaiveDate,
        checkpoint_path: Option<&Path>,
    ) -> Result<Vec<(SyncOp, WindowOutcome)>, SyncError> {
        let mut checkpoint = match checkpoint_path {
            Some(path) => BatchCheckpoint::load_or_new(path, start_date, end_date)?,
            None => BatchCheckpoint::new(start_date, end_date),
        };

        let mut outcomes = Vec::with_capacity(plan.len());
        for op in plan {
            if checkpoint.is_finalized(op) {
                debug!(
                    element = %op.element,
                    operation = %op.operation,
                    "Skipping op already finalized in checkpoint"
                );
                outcomes.push((op.clone(), WindowOutcome::AlreadyComplete));
                continue;
            }

            let window = op.window(start_date, end_date);
            let (outcome, last_enqueued) = self.run_window_inner(&window).await?;
            checkpoint.record(op, last_enqueued, outcome.is_complete());
            if let Some(path) = checkpoint_path {
                checkpoint.save(path)?;
            }
            outcomes.push((op.clone(), outcome));
        }
        Ok(outcomes)
    }

    async fn run_window_inner(
        &mut self,
        window: &SyncWindow,
    ) -> Result<(WindowOutcome, u32), SyncError> {
        // Strategy selection is the structural gate: it fails before any
        // task is enqueued or any store row is written.
        let strategy = select_strategy(&self.catalog, window)?;

        let status = self.progress.get_status(window).await?;
        if status.completed {
            debug!(window = %window.describe(), "Window already finalized, skipping");
            return Ok((WindowOutcome::AlreadyComplete, 0));
        }

        let caps = self
            .catalog
            .get(&window.element)
            .ok_or_else(|| SyncError::no_compatible_operation(window))?;
        let fields: Arc<[String]> = caps.fields.iter().cloned().collect();

        info!(window = %window.describe(), %strategy, "Starting window run");
        emit(
            self.on_progress.as_deref(),
            SyncProgress::WindowStarted {
                window: window.describe(),
                strategy,
                expected_pages: status.expected_pages,
            },
        );

        let sink = self
            .sink
            .take()
            .ok_or_else(|| SyncError::pipeline("load sink unavailable (a previous run was aborted)"))?;

        // One pipeline instance per run; queues are never shared between
        // windows.
        let mut pipeline = WindowPipeline::spawn(
            Arc::clone(&self.gateway),
            sink,
            Arc::clone(&self.progress),
            window.clone(),
            strategy,
            fields,
            &self.options,
            self.on_progress.clone(),
        );

        let driven = self.drive(window, strategy, status, &mut pipeline).await;
        let last_enqueued = pipeline.last_enqueued();
        let report = pipeline.shutdown().await?;
        self.sink = Some(report.sink);
        let pages = driven?;

        if let Some(pages) = pages
            && self.progress.evaluate_completeness(window).await?
        {
            // Idempotent; a crash between the evaluation and here is healed
            // by the next run finalizing again.
            self.progress.finalize(window).await?;
            info!(window = %window.describe(), pages, "Window finalized");
            emit(
                self.on_progress.as_deref(),
                SyncProgress::WindowFinalized {
                    window: window.describe(),
                    pages,
                },
            );
            return Ok((WindowOutcome::Finalized { pages }, last_enqueued));
        }

        let completed = self.count_pages(window, PageStatus::Completed).await?;
        let outcome = WindowOutcome::Incomplete {
            pages,
            completed,
            hung: self.count_pages(window, PageStatus::Hung).await?,
            dead: self.count_pages(window, PageStatus::Dead).await?,
            error_transient: self.count_pages(window, PageStatus::ErrorTransient).await?,
            error_fatal: self.count_pages(window, PageStatus::ErrorFatal).await?,
        };
        warn!(window = %window.describe(), completed, "Window left incomplete");
        emit(
            self.on_progress.as_deref(),
            SyncProgress::WindowIncomplete {
                window: window.describe(),
                completed,
                pages,
            },
        );
        Ok((outcome, last_enqueued))
    }

    /// Enqueue-and-drain phases for the window: the strategy's main pass
    /// plus the single bounded retry pass over hung pages.
    async fn drive(
        &self,
        window: &SyncWindow,
        strategy: FetchStrategy,
        status: WindowStatus,
        pipeline: &mut WindowPipeline,
    ) -> Result<Option<u32>, SyncError> {
        let pages = match (strategy, status.expected_pages) {
            // Page count already known (resumed run, either strategy).
            (_, Some(pages)) => {
                self.run_pending(window, pages, pipeline).await?;
                Some(pages)
            }
            (FetchStrategy::Counted, None) => {
                let records = self.gateway.count(window).await?;
                let pages = records.div_ceil(self.options.page_size as u64) as u32;
                self.progress.set_expected_pages(window, pages).await?;
                info!(window = %window.describe(), records, pages, "Counted window size");
                emit(
                    self.on_progress.as_deref(),
                    SyncProgress::CountReceived { records, pages },
                );
                self.run_pending(window, pages, pipeline).await?;
                Some(pages)
            }
            (FetchStrategy::Filtered, None) => self.discover(window, pipeline).await?,
        };

        // The bounded one-pass retry: resolves same-run transient blips
        // without looping indefinitely. Pages that fail transiently again
        // stay hung for the next invocation.
        let hung = self.progress.get_pages(window, PageStatus::Hung).await?;
        if !hung.is_empty() {
            info!(window = %window.describe(), count = hung.len(), "Re-driving hung pages");
            emit(
                self.on_progress.as_deref(),
                SyncProgress::RetryingHungPages { count: hung.len() },
            );
            let retry: Vec<u32> = hung.into_iter().collect();
            pipeline.run_phase(&self.progress, &retry).await?;
        }

        Ok(pages)
    }

    /// Enqueue every page in `[1, pages]` that is not yet completed, then
    /// wait for the join barrier.
    async fn run_pending(
        &self,
        window: &SyncWindow,
        pages: u32,
        pipeline: &mut WindowPipeline,
    ) -> Result<(), SyncError> {
        let completed = self.progress.get_pages(window, PageStatus::Completed).await?;
        let pending: Vec<u32> = (1..=pages).filter(|p| !completed.contains(p)).collect();
        debug!(
            window = %window.describe(),
            total = pages,
            pending = pending.len(),
            "Enumerated pending pages"
        );
        pipeline.run_phase(&self.progress, &pending).await
    }

    /// Drive the filtered strategy's discovery loop: probe pages in waves
    /// until a worker observes the end of data, then record the page count
    /// retroactively from the last non-empty page index.
    ///
    /// Returns `None` when discovery had to abort before the end of data was
    /// seen; the window's length stays unknown and the next run resumes the
    /// probe (completed pages are skipped).
    async fn discover(
        &self,
        window: &SyncWindow,
        pipeline: &mut WindowPipeline,
    ) -> Result<Option<u32>, SyncError> {
        let mut completed = self.progress.get_pages(window, PageStatus::Completed).await?;
        let wave_size = self.options.discovery_wave.max(1);
        let mut next_page = 1u32;

        loop {
            let wave: Vec<u32> = (next_page..next_page + wave_size)
                .filter(|p| !completed.contains(p))
                .collect();
            pipeline.run_phase(&self.progress, &wave).await?;
            next_page += wave_size;

            // Checked between waves: once any worker has seen an empty page
            // there is nothing further to probe.
            if let Some(first_empty) = pipeline.end_of_data() {
                let pages = first_empty - 1;
                self.progress.set_expected_pages(window, pages).await?;
                info!(window = %window.describe(), pages, "Discovered filtered window size");
                emit(
                    self.on_progress.as_deref(),
                    SyncProgress::DiscoveryComplete { pages },
                );
                return Ok(Some(pages));
            }

            let now_completed = self.progress.get_pages(window, PageStatus::Completed).await?;
            if !wave.is_empty() && now_completed.len() == completed.len() {
                // Every page of the wave failed. Probing further would stack
                // up failures without ever reaching the end of data.
                warn!(window = %window.describe(), "Aborting discovery: no page of the last wave completed");
                emit(
                    self.on_progress.as_deref(),
                    SyncProgress::Warning {
                        message: "discovery aborted before end of data; window length stays unknown"
                            .to_string(),
                    },
                );
                return Ok(None);
            }
            completed = now_completed;
        }
    }

    async fn count_pages(&self, window: &SyncWindow, status: PageStatus) -> Result<u32, SyncError> {
        Ok(self.progress.get_pages(window, status).await?.len() as u32)
    }
}

/// One window's pipeline instance: queues, worker pool, loader, barrier.
struct WindowPipeline {
    task_tx: mpsc::Sender<PageTask>,
    gauge: Arc<JoinGauge>,
    end_of_data: Arc<EndOfData>,
    workers: WorkerPool,
    loader: JoinHandle<LoaderReport>,
    window: SyncWindow,
    strategy: FetchStrategy,
    fields: Arc<[String]>,
    last_enqueued: u32,
}

impl WindowPipeline {
    #[allow(clippy::too_many_arguments)]
    fn spawn(
        gateway: Arc<dyn SourceGateway>,
        sink: Box<dyn LoadSink>,
        progress: Arc<dyn ProgressStore>,
        window: SyncWindow,
        strategy: FetchStrategy,
        fields: Arc<[String]>,
        options: &SyncOptions,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::channel(TASK_QUEUE_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_CAPACITY);
        let gauge = Arc::new(JoinGauge::new());
        let end_of_data = Arc::new(EndOfData::new());

        let ctx = WorkerContext {
            gateway,
            task_rx: Arc::new(Mutex::new(task_rx)),
            result_tx,
            limiter: options.rate_limit_rps.map(FetchRateLimiter::new),
            end_of_data: Arc::clone(&end_of_data),
            page_size: options.page_size,
            on_progress: on_progress.clone(),
        };
        let workers = WorkerPool::spawn(options.workers, ctx);

        let loader = Loader::spawn(
            window.clone(),
            Arc::clone(&fields),
            sink,
            progress,
            result_rx,
            Arc::clone(&gauge),
            on_progress,
        );

        Self {
            task_tx,
            gauge,
            end_of_data,
            workers,
            loader,
            window,
            strategy,
            fields,
            last_enqueued: 0,
        }
    }

    /// Enqueue one set of pages and block until the join barrier clears:
    /// task queue drained AND every dispatched result fully loaded.
    async fn run_phase(
        &mut self,
        progress: &Arc<dyn ProgressStore>,
        pages: &[u32],
    ) -> Result<(), SyncError> {
        if pages.is_empty() {
            return Ok(());
        }

        for &page in pages {
            progress
                .set_page_status(&self.window, page, PageStatus::Pending)
                .await?;
            self.gauge.add(1);
            let task = PageTask {
                window: self.window.clone(),
                page,
                strategy: self.strategy,
                fields: Arc::clone(&self.fields),
            };
            if self.task_tx.send(task).await.is_err() {
                self.gauge.done();
                return Err(SyncError::pipeline("task queue closed while enqueueing"));
            }
            self.last_enqueued = self.last_enqueued.max(page);
        }

        self.gauge.wait_idle().await;
        Ok(())
    }

    /// First empty page observed by any worker, if one has been.
    fn end_of_data(&self) -> Option<u32> {
        self.end_of_data.first_empty()
    }

    /// Highest page enqueued during this run.
    fn last_enqueued(&self) -> u32 {
        self.last_enqueued
    }

    /// Tear the pipeline down in dependency order and recover the sink.
    async fn shutdown(self) -> Result<LoaderReport, SyncError> {
        // Closing the task queue lets workers drain and exit; their result
        // senders drop, the result queue closes, and the loader runs out.
        drop(self.task_tx);
        self.workers.join().await;
        self.loader
            .await
            .map_err(|e| SyncError::pipeline(format!("loader task failed: {e}")))
    }
}
