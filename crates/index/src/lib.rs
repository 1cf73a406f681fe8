//! Semantic index lifecycle for Quill.
//!
//! Documents get one collection each, named by their sanitized file stem.
//! Re-ingesting a document replaces its collection.

pub mod manager;
pub mod sanitize;
pub mod store;
pub mod vector;

pub use manager::IndexManager;
pub use sanitize::{DEFAULT_COLLECTION, sanitize};
pub use store::FileIndexStore;
pub use vector::cosine_similarity;
