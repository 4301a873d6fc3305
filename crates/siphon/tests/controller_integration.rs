//! Integration tests for the sync controller pipeline.
//!
//! These drive `run_window` end to end over a scripted in-memory gateway, a
//! migrated SQLite progress store, and a real (or scripted) load sink. Each
//! run is wrapped in a timeout so a broken join barrier shows up as a test
//! failure instead of a hang.

#![cfg(feature = "migrate")]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DbErr, RuntimeErr, Statement};

use siphon::store::{list_windows, recent_errors};
use siphon::{
    ElementCapabilities, ElementCatalog, FetchStrategy, LoadSink, OperationSupport, PageStatus,
    ProgressStore, Row, RowBatch, SeaOrmLoadSink, SeaOrmProgressStore, SourceError, SourceGateway,
    StoreError, SyncController, SyncError, SyncOp, SyncOptions, SyncWindow, WindowOutcome,
    connect, connect_and_migrate,
};

/// Maximum time any window run should take. Exceeding it means the join
/// barrier or a queue is stuck.
const RUN_TIMEOUT: Duration = Duration::from_secs(10);

fn dates() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

fn widget_window() -> SyncWindow {
    let (start, end) = dates();
    SyncWindow::new("Widget", "sync", start, end)
}

fn widget_fields() -> Vec<String> {
    vec![
        "id".to_string(),
        "name".to_string(),
        "changed_on".to_string(),
    ]
}

fn widget_catalog(counted: bool, filtered: bool) -> ElementCatalog {
    ElementCatalog::new().with_element(
        "Widget",
        ElementCapabilities {
            fields: widget_fields(),
            operations: std::collections::BTreeMap::from([(
                "sync".to_string(),
                OperationSupport { counted, filtered },
            )]),
        },
    )
}

// ─── Scripted Gateway ────────────────────────────────────────────────────────

#[derive(Clone)]
enum Fetch {
    /// A batch of `n` generated rows.
    Rows(usize),
    /// A batch of `n` rows that all share one id (violates the loader
    /// table's primary key).
    Duplicates(usize),
    /// Transport failure.
    Transient,
    /// Decode failure.
    Fatal,
    /// Zero rows.
    Empty,
}

/// Gateway whose per-page behavior is scripted; unscripted pages fall back
/// to rows derived from the configured record count (or an empty page when
/// no count is set).
struct ScriptedGateway {
    records: u64,
    scripts: Mutex<HashMap<u32, Vec<Fetch>>>,
    fetch_log: Mutex<Vec<u32>>,
    count_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn counted(records: u64) -> Self {
        Self {
            records,
            scripts: Mutex::new(HashMap::new()),
            fetch_log: Mutex::new(Vec::new()),
            count_calls: AtomicUsize::new(0),
        }
    }

    fn filtered() -> Self {
        Self::counted(0)
    }

    fn with_script(self, page: u32, outcomes: Vec<Fetch>) -> Self {
        self.scripts.lock().unwrap().insert(page, outcomes);
        self
    }

    fn fetched_pages(&self) -> Vec<u32> {
        self.fetch_log.lock().unwrap().clone()
    }

    fn fetch_count(&self, page: u32) -> usize {
        self.fetch_log
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == page)
            .count()
    }

    fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn default_fetch(&self, page: u32, page_size: u32) -> Fetch {
        if self.records == 0 {
            return Fetch::Empty;
        }
        let before = (page as u64 - 1) * page_size as u64;
        let remaining = self.records.saturating_sub(before);
        Fetch::Rows(remaining.min(page_size as u64) as usize)
    }
}

fn generated_row(fields: &[String], id: usize) -> Row {
    fields
        .iter()
        .map(|f| match f.as_str() {
            "id" => id.to_string(),
            "name" => format!("widget-{id}"),
            "changed_on" => "2024-01-15".to_string(),
            _ => String::new(),
        })
        .collect()
}

#[async_trait]
impl SourceGateway for ScriptedGateway {
    async fn count(&self, _window: &SyncWindow) -> Result<u64, SourceError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records)
    }

    async fn fetch(
        &self,
        _window: &SyncWindow,
        _strategy: FetchStrategy,
        fields: &[String],
        page: u32,
        page_size: u32,
    ) -> Result<RowBatch, SourceError> {
        self.fetch_log.lock().unwrap().push(page);

        let scripted = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(&page).and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            })
        };

        match scripted.unwrap_or_else(|| self.default_fetch(page, page_size)) {
            Fetch::Rows(n) => {
                let first = (page as usize - 1) * page_size as usize + 1;
                Ok(RowBatch::new(
                    (first..first + n).map(|id| generated_row(fields, id)).collect(),
                ))
            }
            Fetch::Duplicates(n) => Ok(RowBatch::new(
                (0..n).map(|_| generated_row(fields, 1)).collect(),
            )),
            Fetch::Transient => Err(SourceError::network("connection reset by peer")),
            Fetch::Fatal => Err(SourceError::decode("unexpected payload shape")),
            Fetch::Empty => Ok(RowBatch::default()),
        }
    }
}

// ─── Scripted Sink ───────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum SinkCall {
    Ok,
    Reconnectable,
}

/// Load sink whose per-call outcomes are scripted; used for the reconnect
/// paths a real SQLite file won't produce on demand.
struct ScriptedSink {
    plan: Mutex<Vec<SinkCall>>,
    loads: Arc<Mutex<Vec<usize>>>,
    reconnects: Arc<AtomicUsize>,
}

impl ScriptedSink {
    fn new(plan: Vec<SinkCall>) -> (Self, Arc<Mutex<Vec<usize>>>, Arc<AtomicUsize>) {
        let loads = Arc::new(Mutex::new(Vec::new()));
        let reconnects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                plan: Mutex::new(plan),
                loads: Arc::clone(&loads),
                reconnects: Arc::clone(&reconnects),
            },
            loads,
            reconnects,
        )
    }

    fn next_call(&self) -> SinkCall {
        let mut plan = self.plan.lock().unwrap();
        if plan.is_empty() {
            SinkCall::Ok
        } else {
            plan.remove(0)
        }
    }
}

#[async_trait]
impl LoadSink for ScriptedSink {
    async fn bulk_load(
        &mut self,
        _table: &str,
        _columns: &[String],
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        match self.next_call() {
            SinkCall::Ok => {
                self.loads.lock().unwrap().push(rows.len());
                Ok(rows.len() as u64)
            }
            SinkCall::Reconnectable => Err(StoreError::Database(DbErr::Conn(
                RuntimeErr::Internal("connection closed".to_string()),
            ))),
        }
    }

    async fn reconnect(&mut self) -> Result<(), StoreError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
    dir: tempfile::TempDir,
    gateway: Arc<ScriptedGateway>,
    store: Arc<SeaOrmProgressStore>,
    sink_url: Option<String>,
    controller: SyncController,
}

fn test_options() -> SyncOptions {
    SyncOptions {
        workers: 2,
        page_size: 100,
        discovery_wave: 2,
        rate_limit_rps: None,
    }
}

impl Harness {
    /// Harness over a real SQLite load sink with a `widget_loader` table.
    async fn with_sqlite_sink(
        gateway: ScriptedGateway,
        catalog: ElementCatalog,
        unique_ids: bool,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("target.db").display()
        );

        let sink = SeaOrmLoadSink::connect(&sink_url).await.expect("sink");
        let ddl = if unique_ids {
            "CREATE TABLE widget_loader (id TEXT PRIMARY KEY, name TEXT, changed_on TEXT)"
        } else {
            "CREATE TABLE widget_loader (id TEXT, name TEXT, changed_on TEXT)"
        };
        let conn = sink.connection();
        conn.execute(Statement::from_string(
            conn.get_database_backend(),
            ddl.to_string(),
        ))
        .await
        .expect("loader table DDL");

        Self::assemble(dir, gateway, catalog, Box::new(sink), Some(sink_url), test_options()).await
    }

    /// Harness over a scripted sink.
    async fn with_scripted_sink(
        gateway: ScriptedGateway,
        catalog: ElementCatalog,
        sink: ScriptedSink,
        workers: usize,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = SyncOptions {
            workers,
            ..test_options()
        };
        Self::assemble(dir, gateway, catalog, Box::new(sink), None, options).await
    }

    async fn assemble(
        dir: tempfile::TempDir,
        gateway: ScriptedGateway,
        catalog: ElementCatalog,
        sink: Box<dyn LoadSink>,
        sink_url: Option<String>,
        options: SyncOptions,
    ) -> Self {
        let store_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("progress.db").display()
        );
        let store_db = connect_and_migrate(&store_url).await.expect("progress db");
        let store = Arc::new(SeaOrmProgressStore::new(store_db));
        let gateway = Arc::new(gateway);

        let progress: Arc<dyn ProgressStore> = store.clone();
        let source: Arc<dyn SourceGateway> = gateway.clone();
        let controller =
            SyncController::new(source, progress, sink, catalog).with_options(options);

        Self {
            dir,
            gateway,
            store,
            sink_url,
            controller,
        }
    }

    async fn run(&mut self, window: &SyncWindow) -> WindowOutcome {
        tokio::time::timeout(RUN_TIMEOUT, self.controller.run_window(window))
            .await
            .expect("run_window timed out - pipeline stuck")
            .expect("run_window failed")
    }

    async fn pages(&self, window: &SyncWindow, status: PageStatus) -> BTreeSet<u32> {
        self.store
            .get_pages(window, status)
            .await
            .expect("get_pages")
    }

    async fn loader_rows(&self) -> i64 {
        let url = self.sink_url.as_ref().expect("harness has no sqlite sink");
        let db = connect(url).await.expect("sink connection");
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT COUNT(*) AS n FROM widget_loader".to_string(),
            ))
            .await
            .expect("count query")
            .expect("count row");
        row.try_get::<i64>("", "n").expect("count value")
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.dir.path().join("batch.json")
    }
}

// ─── Counted Strategy ────────────────────────────────────────────────────────

#[tokio::test]
async fn counted_window_loads_every_page_and_finalizes() {
    let gateway = ScriptedGateway::counted(250);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 3 });
    assert_eq!(
        h.pages(&window, PageStatus::Completed).await,
        BTreeSet::from([1, 2, 3])
    );
    assert_eq!(h.loader_rows().await, 250);

    let mut fetched = h.gateway.fetched_pages();
    fetched.sort_unstable();
    assert_eq!(fetched, vec![1, 2, 3]);
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let gateway = ScriptedGateway::counted(250);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    assert_eq!(h.run(&window).await, WindowOutcome::Finalized { pages: 3 });
    let fetches_after_first = h.gateway.fetched_pages().len();

    // Nothing changed at the source; the second run must not fetch or load.
    assert_eq!(h.run(&window).await, WindowOutcome::AlreadyComplete);
    assert_eq!(h.gateway.fetched_pages().len(), fetches_after_first);
    assert_eq!(h.loader_rows().await, 250);
}

#[tokio::test]
async fn interrupted_window_resumes_with_only_missing_pages() {
    let gateway = ScriptedGateway::counted(250);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    // Simulate a prior run that completed pages 1 and 2 before dying.
    h.store.get_status(&window).await.unwrap();
    h.store.set_expected_pages(&window, 3).await.unwrap();
    h.store
        .set_page_status(&window, 1, PageStatus::Completed)
        .await
        .unwrap();
    h.store
        .set_page_status(&window, 2, PageStatus::Completed)
        .await
        .unwrap();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 3 });
    assert_eq!(h.gateway.fetched_pages(), vec![3]);
    // Only page 3's 50 rows were loaded by this run.
    assert_eq!(h.loader_rows().await, 50);
}

// ─── Filtered Strategy ───────────────────────────────────────────────────────

#[tokio::test]
async fn filtered_discovery_stops_at_first_empty_page() {
    let gateway = ScriptedGateway::filtered()
        .with_script(1, vec![Fetch::Rows(100)])
        .with_script(2, vec![Fetch::Rows(100)])
        .with_script(3, vec![Fetch::Rows(40)]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(false, true), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 3 });
    assert_eq!(
        h.pages(&window, PageStatus::Completed).await,
        BTreeSet::from([1, 2, 3])
    );
    assert_eq!(h.loader_rows().await, 240);
    // Page 4 is the terminal probe; nothing beyond it is ever enqueued.
    let max_fetched = h.gateway.fetched_pages().into_iter().max().unwrap();
    assert_eq!(max_fetched, 4);
    assert_eq!(
        h.store.get_status(&window).await.unwrap().expected_pages,
        Some(3)
    );
}

#[tokio::test]
async fn empty_filtered_window_finalizes_with_zero_pages() {
    let gateway = ScriptedGateway::filtered();
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(false, true), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 0 });
    assert_eq!(h.loader_rows().await, 0);
}

#[tokio::test]
async fn discovery_aborts_when_no_page_of_a_wave_completes() {
    let gateway = ScriptedGateway::filtered()
        .with_script(1, vec![Fetch::Transient, Fetch::Transient])
        .with_script(2, vec![Fetch::Transient, Fetch::Transient]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(false, true), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    // Discovery gave up before seeing the end of data; the window length
    // stays unknown and both probed pages ended hung after their one retry.
    assert_eq!(
        outcome,
        WindowOutcome::Incomplete {
            pages: None,
            completed: 0,
            hung: 2,
            dead: 0,
            error_transient: 0,
            error_fatal: 0,
        }
    );
    assert_eq!(h.gateway.fetch_count(1), 2);
    assert_eq!(h.gateway.fetch_count(2), 2);
}

// ─── Error Handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_retries_once_and_completes() {
    let gateway = ScriptedGateway::counted(250).with_script(2, vec![Fetch::Transient]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 3 });
    assert_eq!(h.gateway.fetch_count(2), 2);
    assert_eq!(h.loader_rows().await, 250);
}

#[tokio::test]
async fn double_transient_failure_leaves_page_hung() {
    let gateway =
        ScriptedGateway::counted(250).with_script(2, vec![Fetch::Transient, Fetch::Transient]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(
        outcome,
        WindowOutcome::Incomplete {
            pages: Some(3),
            completed: 2,
            hung: 1,
            dead: 0,
            error_transient: 0,
            error_fatal: 0,
        }
    );
    // Exactly two attempts: the original and the single in-run retry.
    assert_eq!(h.gateway.fetch_count(2), 2);
    assert!(!h.store.evaluate_completeness(&window).await.unwrap());
}

#[tokio::test]
async fn fatal_failure_is_logged_and_not_retried() {
    let gateway = ScriptedGateway::counted(250).with_script(2, vec![Fetch::Fatal]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(
        outcome,
        WindowOutcome::Incomplete {
            pages: Some(3),
            completed: 2,
            hung: 0,
            dead: 0,
            error_transient: 0,
            error_fatal: 1,
        }
    );
    assert_eq!(h.gateway.fetch_count(2), 1);

    let windows = list_windows(h.store.connection()).await.unwrap();
    assert_eq!(windows.len(), 1);
    let errors = recent_errors(h.store.connection(), windows[0].id, 10)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].page, 2);
    assert!(errors[0].message.contains("unexpected payload shape"));
}

#[tokio::test]
async fn integrity_fault_marks_page_dead_and_window_stays_open() {
    let gateway = ScriptedGateway::counted(250).with_script(2, vec![Fetch::Duplicates(2)]);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), true).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(
        outcome,
        WindowOutcome::Incomplete {
            pages: Some(3),
            completed: 2,
            hung: 0,
            dead: 1,
            error_transient: 0,
            error_fatal: 0,
        }
    );
    assert_eq!(h.pages(&window, PageStatus::Dead).await, BTreeSet::from([2]));
    assert_eq!(
        h.pages(&window, PageStatus::Completed).await,
        BTreeSet::from([1, 3])
    );
    // Page 2's transaction rolled back whole: pages 1 and 3 only.
    assert_eq!(h.loader_rows().await, 150);
    assert!(!h.store.evaluate_completeness(&window).await.unwrap());
}

#[tokio::test]
async fn loader_reconnects_and_retries_the_same_page_once() {
    let gateway = ScriptedGateway::counted(100);
    let (sink, loads, reconnects) = ScriptedSink::new(vec![SinkCall::Reconnectable, SinkCall::Ok]);
    let mut h =
        Harness::with_scripted_sink(gateway, widget_catalog(true, false), sink, 1).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 1 });
    assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    assert_eq!(*loads.lock().unwrap(), vec![100]);
    // The page was never re-fetched; only the load was replayed.
    assert_eq!(h.gateway.fetch_count(1), 1);
}

#[tokio::test]
async fn second_infrastructure_failure_stalls_the_page() {
    let gateway = ScriptedGateway::counted(100);
    let (sink, loads, reconnects) =
        ScriptedSink::new(vec![SinkCall::Reconnectable, SinkCall::Reconnectable]);
    let mut h =
        Harness::with_scripted_sink(gateway, widget_catalog(true, false), sink, 1).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(
        outcome,
        WindowOutcome::Incomplete {
            pages: Some(1),
            completed: 0,
            hung: 0,
            dead: 0,
            error_transient: 1,
            error_fatal: 0,
        }
    );
    assert_eq!(reconnects.load(Ordering::SeqCst), 1);
    assert!(loads.lock().unwrap().is_empty());

    let windows = list_windows(h.store.connection()).await.unwrap();
    let errors = recent_errors(h.store.connection(), windows[0].id, 10)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
}

// ─── Strategy Selection ──────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_operation_fails_before_any_fetch() {
    let gateway = ScriptedGateway::counted(250);
    let catalog = widget_catalog(false, false);
    let mut h = Harness::with_sqlite_sink(gateway, catalog, false).await;
    let window = widget_window();

    let err = h.controller.run_window(&window).await.unwrap_err();

    assert!(matches!(err, SyncError::NoCompatibleOperation { .. }));
    assert!(h.gateway.fetched_pages().is_empty());
    // The structural failure happens before the window is even recorded.
    assert!(list_windows(h.store.connection()).await.unwrap().is_empty());
}

#[tokio::test]
async fn force_counted_override_uses_the_counted_strategy() {
    let gateway = ScriptedGateway::counted(100);
    let catalog = widget_catalog(true, true).with_force_counted("Widget");
    let mut h = Harness::with_sqlite_sink(gateway, catalog, false).await;
    let window = widget_window();

    let outcome = h.run(&window).await;

    assert_eq!(outcome, WindowOutcome::Finalized { pages: 1 });
    assert_eq!(h.gateway.count_calls(), 1);
}

// ─── Batch Runs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_batch_checkpoints_and_skips_finalized_ops_on_restart() {
    let gateway = ScriptedGateway::counted(250);
    let mut h = Harness::with_sqlite_sink(gateway, widget_catalog(true, false), false).await;
    let (start, end) = dates();
    let plan = vec![SyncOp::new("Widget", "sync")];
    let checkpoint = h.checkpoint_path();

    let outcomes = h
        .controller
        .run_batch(&plan, start, end, Some(&checkpoint))
        .await
        .unwrap();
    assert_eq!(outcomes[0].1, WindowOutcome::Finalized { pages: 3 });
    assert!(checkpoint.exists());
    let fetches_after_first = h.gateway.fetched_pages().len();

    // A restarted batch consults the checkpoint and skips the op outright.
    let outcomes = h
        .controller
        .run_batch(&plan, start, end, Some(&checkpoint))
        .await
        .unwrap();
    assert_eq!(outcomes[0].1, WindowOutcome::AlreadyComplete);
    assert_eq!(h.gateway.fetched_pages().len(), fetches_after_first);
}
