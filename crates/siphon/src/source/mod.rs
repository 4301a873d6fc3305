//! Remote source abstractions: the fetch gateway contract, the element
//! capability catalog, the failure-classification policy, and a proactive
//! rate limiter for fetch workers.
//!
//! The wire protocol and session lifecycle of the remote source live behind
//! the [`SourceGateway`] trait; the pipeline never sees them.

mod catalog;
mod errors;
mod gateway;
mod rate_limit;

pub use catalog::{ElementCapabilities, ElementCatalog, OperationSupport};
pub use errors::{FailureClass, Result, SourceError};
pub use gateway::{Row, RowBatch, SourceGateway};
pub use rate_limit::{DEFAULT_FETCH_RPS, FetchRateLimiter};
