//! Per-document index lifecycle.

use crate::sanitize::sanitize;
use quill_core::error::IndexError;
use quill_core::index::{Chunk, IndexRef, SemanticIndex, Snippet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Names, builds and queries per-document semantic indexes.
#[derive(Clone)]
pub struct IndexManager {
    backend: Arc<dyn SemanticIndex>,
    top_k: usize,
}

impl IndexManager {
    pub fn new(backend: Arc<dyn SemanticIndex>, top_k: usize) -> Self {
        Self {
            backend,
            top_k: top_k.max(1),
        }
    }

    pub fn backend(&self) -> &Arc<dyn SemanticIndex> {
        &self.backend
    }

    /// Collection identifier for a document: its sanitized file stem.
    pub fn collection_for(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        sanitize(&stem)
    }

    /// Build (or rebuild) the index for `identifier` from `chunks`.
    pub async fn create_index(
        &self,
        chunks: &[Chunk],
        identifier: &str,
    ) -> Result<IndexRef, IndexError> {
        self.backend
            .create_or_replace(&sanitize(identifier), chunks)
            .await
    }

    /// The best snippets across `collections`, highest score first.
    ///
    /// Collections that cannot be read are skipped.
    pub async fn retrieve(&self, collections: &[String], query: &str) -> Vec<Snippet> {
        let lookups = collections
            .iter()
            .map(|c| self.backend.retrieve(c, query, self.top_k));
        let results = futures::future::join_all(lookups).await;

        let mut snippets: Vec<Snippet> = Vec::new();
        for (collection, result) in collections.iter().zip(results) {
            match result {
                Ok(hits) => snippets.extend(hits),
                Err(e) => warn!(collection = %collection, error = %e, "Skipping unreadable index"),
            }
        }

        snippets.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        snippets.truncate(self.top_k);
        debug!(collections = collections.len(), hits = snippets.len(), "Retrieved context");
        snippets
    }
}
