//! Siphon - resumable bulk synchronization of paginated remote records into
//! a relational store.
//!
//! The core is the [`SyncController`]: it decomposes a synchronization
//! window into page-level fetch tasks, dispatches them across a bounded
//! worker pool, funnels results through a single loader, and persists
//! per-page progress so an interrupted run resumes without re-fetching
//! completed pages or double-loading data.
//!
//! The remote source lives behind the [`SourceGateway`] trait and the target
//! store behind [`ProgressStore`] and [`LoadSink`]; sea-orm backed
//! implementations of the store side are provided.
//!
//! # Features
//!
//! - `migrate` (default) - enables [`connect_and_migrate`] and the
//!   [`migration`] module for managing the progress schema.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use siphon::{
//!     connect_and_migrate, SeaOrmLoadSink, SeaOrmProgressStore, SyncController, SyncWindow,
//! };
//!
//! let db = connect_and_migrate("sqlite://siphon.db?mode=rwc").await?;
//! let progress = Arc::new(SeaOrmProgressStore::new(db));
//! let sink = Box::new(SeaOrmLoadSink::connect("postgres:///warehouse").await?);
//!
//! let mut controller = SyncController::new(gateway, progress, sink, catalog);
//! let window = SyncWindow::new("Constituent", "update", start, end);
//! let outcome = controller.run_window(&window).await?;
//! ```

pub mod db;
pub mod entity;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use source::{
    ElementCapabilities, ElementCatalog, FetchRateLimiter, OperationSupport, Row, RowBatch,
    SourceError, SourceGateway,
};
pub use store::{
    LoadSink, ProgressStore, SeaOrmLoadSink, SeaOrmProgressStore, StoreError, WindowStatus,
};
pub use sync::{
    FetchStrategy, SyncController, SyncError, SyncOp, SyncOptions, SyncWindow, WindowOutcome,
};
