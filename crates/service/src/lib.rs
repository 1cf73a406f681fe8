//! The Quill service layer.
//!
//! A [`ServiceContext`] owns the worker pools, collaborator handle, profile
//! store, index backend and response cache for the life of the process.
//! `ingest`, `update` and `query` are methods on it and always return a
//! structured outcome.

pub mod cache;
pub mod context;
pub mod history;
pub mod ingest;
pub mod outcome;
pub mod query;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{CacheKey, ResponseCache};
pub use context::ServiceContext;
pub use history::format_history;
pub use outcome::{ErrorPayload, IngestOutcome, QueryOutcome, Status, UpdateOutcome};
pub use query::QueryRequest;
pub use runtime::WorkerPools;
