//! File-backed embedding index.
//!
//! Each collection is one JSON file at `<dir>/<collection>/index.json`
//! holding the chunk texts and their embeddings. Collections are loaded
//! lazily and kept in memory until replaced.

use crate::sanitize::sanitize;
use crate::vector::rank;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::error::IndexError;
use quill_core::index::{Chunk, IndexRef, SemanticIndex, Snippet};
use quill_core::profile::pointer_location;
use quill_providers::Collaborator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIndex {
    pub collection: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<StoredChunk>,
}

pub struct FileIndexStore {
    root: PathBuf,
    collaborator: Collaborator,
    loaded: RwLock<HashMap<String, Arc<StoredIndex>>>,
}

impl FileIndexStore {
    pub fn new(root: impl Into<PathBuf>, collaborator: Collaborator) -> Self {
        Self {
            root: root.into(),
            collaborator,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self, collection: &str) -> PathBuf {
        self.root.join(collection).join(INDEX_FILE)
    }

    async fn load(&self, collection: &str) -> Result<Arc<StoredIndex>, IndexError> {
        // Only names this store could have written resolve under the root
        if sanitize(collection) != collection {
            warn!(collection, "Refusing to load a collection with an unsanitized name");
            return Err(IndexError::NotFound(collection.to_string()));
        }
        if let Some(index) = self.loaded.read().await.get(collection) {
            return Ok(index.clone());
        }

        let path = self.index_path(collection);
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => IndexError::NotFound(collection.to_string()),
            _ => IndexError::Storage(format!("Failed to read {}: {e}", path.display())),
        })?;
        let index: StoredIndex = serde_json::from_str(&content)
            .map_err(|e| IndexError::Storage(format!("Corrupt index {}: {e}", path.display())))?;

        let index = Arc::new(index);
        self.loaded
            .write()
            .await
            .insert(collection.to_string(), index.clone());
        debug!(collection, chunks = index.chunks.len(), "Loaded index from disk");
        Ok(index)
    }

    fn persist(&self, index: &StoredIndex) -> Result<(), IndexError> {
        let storage = |e: std::io::Error| IndexError::Storage(e.to_string());
        let dir = self.root.join(&index.collection);
        std::fs::create_dir_all(&dir).map_err(storage)?;

        let json = serde_json::to_string(index).map_err(|e| IndexError::Storage(e.to_string()))?;
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, json).map_err(storage)?;
        std::fs::rename(&tmp, &path).map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl SemanticIndex for FileIndexStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn create_or_replace(
        &self,
        collection: &str,
        chunks: &[Chunk],
    ) -> Result<IndexRef, IndexError> {
        let collection = sanitize(collection);
        if chunks.is_empty() {
            return Err(IndexError::Empty(collection));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .collaborator
            .embed(texts)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let index = StoredIndex {
            collection: collection.clone(),
            created_at: Utc::now(),
            chunks: chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| StoredChunk {
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    embedding,
                })
                .collect(),
        };

        self.persist(&index)?;
        let count = index.chunks.len();
        self.loaded
            .write()
            .await
            .insert(collection.clone(), Arc::new(index));

        info!(collection = %collection, chunks = count, "Index created");
        Ok(IndexRef {
            location: pointer_location(&collection),
            collection,
        })
    }

    async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Snippet>, IndexError> {
        let index = self.load(collection).await?;

        let query_embedding = match self.collaborator.embed(vec![query.to_string()]).await {
            Ok(mut embeddings) => embeddings.pop(),
            Err(e) => {
                warn!(collection, error = %e, "Query embedding failed, ranking by keywords");
                None
            }
        };

        Ok(rank(&index.chunks, query, query_embedding.as_deref(), top_k)
            .into_iter()
            .map(|(score, chunk)| Snippet {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                score,
            })
            .collect())
    }

    async fn collections(&self) -> Result<Vec<String>, IndexError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IndexError::Storage(e.to_string())),
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join(INDEX_FILE).is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}
