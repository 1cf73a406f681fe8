//! Semantic index boundary.
//!
//! The index stores a document's chunks under a sanitized collection
//! identifier and returns ranked snippets for a query.

use crate::error::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An overlapping text window produced by the chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position within the document
    pub index: usize,

    /// Which parsed segment the window was cut from
    pub segment: usize,

    /// Character offset of the window within its segment
    pub offset: usize,

    pub text: String,

    /// Source metadata carried over from the parsed segment
    pub source: String,
}

/// Reference to a persisted semantic index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRef {
    /// Sanitized collection identifier
    pub collection: String,

    /// Logical storage location (`vector_db/<collection>`)
    pub location: String,
}

/// A ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Create-or-replace and retrieve over named collections.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Build the collection from `chunks`, replacing any previous contents.
    async fn create_or_replace(
        &self,
        collection: &str,
        chunks: &[Chunk],
    ) -> Result<IndexRef, IndexError>;

    /// Return up to `top_k` snippets ranked by relevance to `query`.
    async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Snippet>, IndexError>;

    /// Names of all persisted collections.
    async fn collections(&self) -> Result<Vec<String>, IndexError>;
}
