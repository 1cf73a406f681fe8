//! Document ingestion and conversation updates.

use crate::context::ServiceContext;
use crate::outcome::{IngestOutcome, UpdateOutcome};
use quill_core::error::{Error, ParseError};
use quill_core::index::Chunk;
use quill_index::IndexManager;
use quill_ingest::flatten;
use std::path::Path;
use tracing::{error, info, warn};

impl ServiceContext {
    /// Parse, chunk, extract, flatten and merge one document, then index it.
    ///
    /// Index failures downgrade the result to `partial_success`; the merged
    /// facts are kept.
    pub async fn ingest(&self, path: impl AsRef<Path>) -> IngestOutcome {
        let path = path.as_ref();
        match self.try_ingest(path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Ingestion failed");
                IngestOutcome::failed(&e)
            }
        }
    }

    async fn try_ingest(&self, path: &Path) -> Result<IngestOutcome, Error> {
        let chunks = self.parse_and_chunk(path).await?;
        info!(path = %path.display(), chunks = chunks.len(), "Document chunked");

        let collection = IndexManager::collection_for(path);
        let (raw, indexed) = tokio::join!(
            self.extractor.extract_document(&chunks),
            self.index.create_index(&chunks, &collection),
        );

        let facts = flatten(&raw);
        let merged = self.profile.merge(&self.reconciler, &facts).await?;
        info!(
            path = %path.display(),
            extracted = facts.len(),
            fields = merged.profile.len(),
            "Facts merged"
        );

        match indexed {
            Ok(reference) => match self.profile.register_pointer(&reference.collection).await {
                Ok(_) => Ok(IngestOutcome::indexed(&facts, reference)),
                Err(e) => {
                    warn!(collection = %reference.collection, error = %e, "Index pointer not recorded, keeping extracted facts");
                    Ok(IngestOutcome::unindexed(&facts, &e.into()))
                }
            },
            Err(e) => {
                warn!(collection = %collection, error = %e, "Index creation failed, keeping extracted facts");
                Ok(IngestOutcome::unindexed(&facts, &e.into()))
            }
        }
    }

    /// Parse on the CPU pool and cut the segments into chunks.
    pub(crate) async fn parse_and_chunk(&self, path: &Path) -> Result<Vec<Chunk>, Error> {
        let parsers = self.parsers.clone();
        let chunker = self.chunker;
        let owned = path.to_path_buf();

        let chunks = self
            .pools
            .run_cpu(move || -> Result<Vec<Chunk>, ParseError> {
                let segments = parsers.parse(&owned)?;
                Ok(chunker.chunk(&segments))
            })
            .await??;
        Ok(chunks)
    }

    /// Extract facts from conversation text and merge them.
    ///
    /// Blank text is a no-op that reports the current profile as `skipped`.
    pub async fn update(&self, conversation: &str) -> UpdateOutcome {
        if conversation.trim().is_empty() {
            warn!("Empty conversation text provided, no update performed");
            return UpdateOutcome::skipped(&*self.profile.snapshot().await);
        }

        let raw = self.extractor.extract_conversation(conversation).await;
        let facts = flatten(&raw);

        match self.profile.merge(&self.reconciler, &facts).await {
            Ok(merged) => {
                info!(extracted = facts.len(), fields = merged.profile.len(), "Conversation merged");
                UpdateOutcome::merged(&facts, &merged.profile)
            }
            Err(e) => {
                let e = Error::from(e);
                error!(error = %e, "Conversation update failed");
                UpdateOutcome::failed(&*self.profile.snapshot().await, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::outcome::Status;
    use crate::test_helpers::{context, write};
    use quill_core::profile::FieldValue;
    use quill_providers::ScriptedProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    const W2_REPLY: &str = r#"Here is the data:
```json
{"fullName": "Jane Doe", "mobile": "555-0100", "employer": {"name": "ACME"}}
```"#;

    #[tokio::test]
    async fn ingest_merges_facts_and_registers_index() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("{}").on("DOCUMENT CONTENT", W2_REPLY));
        let ctx = context(&dir, provider);
        let path = write(&dir, "W2 Form.txt", "Employee: Jane Doe\nPhone: 555-0100\nEmployer: ACME");

        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.extracted_facts["employer_name"], "ACME");
        assert_eq!(outcome.index.as_ref().unwrap().collection, "w2_form");

        let profile = ctx.profile().snapshot().await;
        assert_eq!(profile.get("fullName"), Some(&FieldValue::from("Jane Doe")));
        assert_eq!(profile.get("w2_form"), Some(&FieldValue::from("vector_db/w2_form")));
        assert_eq!(profile.index_collections(), vec!["w2_form"]);
        assert!(dir.path().join("uploads/user_info.json").is_file());
    }

    #[tokio::test]
    async fn missing_and_unsupported_documents_are_errors() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedProvider::new("{}")));

        let outcome = ctx.ingest(dir.path().join("nope.txt")).await;
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.error.as_ref().unwrap().kind, "parse_error");

        let path = write(&dir, "sheet.xlsx", "cells");
        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::Error);
        assert!(outcome.error.unwrap().message.contains("xlsx"));
        assert!(ctx.profile().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn empty_document_is_partial_success_with_no_facts() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("{}"));
        let ctx = context(&dir, provider.clone());
        let path = write(&dir, "blank.txt", "   \n\n  ");

        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::PartialSuccess);
        assert_eq!(outcome.extracted_facts, serde_json::json!({}));
        assert_eq!(outcome.error.unwrap().kind, "index_error");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_extraction_degrades_to_no_facts() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedProvider::new("Sorry, I cannot help with that.")));
        let path = write(&dir, "notes.txt", "Some notes about nothing in particular");

        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.extracted_facts, serde_json::json!({}));
        // Only the pointer entry was added
        assert_eq!(ctx.profile().snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn reingesting_replaces_the_index() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedProvider::new("{}")));
        let path = write(&dir, "lease.txt", "rent 1200");
        ctx.ingest(&path).await;
        write(&dir, "lease.txt", "rent 1500");
        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::Success);

        let hits = ctx.index().retrieve(&["lease".to_string()], "rent").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "rent 1500");
        assert_eq!(ctx.profile().snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn extracted_pointer_values_never_become_index_entries() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("{}")
                .on("DOCUMENT CONTENT", r#"{"notes": "vector_db/../secret", "mobile": "555-0100"}"#),
        );
        let ctx = context(&dir, provider);
        let path = write(&dir, "memo.txt", "see vector_db/../secret");

        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::Success);
        let profile = ctx.profile().snapshot().await;
        assert!(profile.get("notes").is_none());
        assert_eq!(profile.get("mobile"), Some(&FieldValue::from("555-0100")));
        assert_eq!(profile.index_collections(), vec!["memo"]);
    }

    #[tokio::test]
    async fn pointer_write_failure_keeps_merged_facts() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("user_info.json"), r#"{"fullName": "Jane Doe"}"#).unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("{}").on("DOCUMENT CONTENT", r#"{"fullName": "Jane Doe"}"#),
        );
        let ctx = context(&dir, provider);
        // The merge changes nothing, so the first write is the pointer's
        std::fs::create_dir_all(uploads.join("user_info.json.tmp")).unwrap();
        let path = write(&dir, "id.txt", "Jane Doe");

        let outcome = ctx.ingest(&path).await;
        assert_eq!(outcome.status, Status::PartialSuccess);
        assert_eq!(outcome.extracted_facts["fullName"], "Jane Doe");
        assert_eq!(outcome.error.unwrap().kind, "profile_error");
        assert!(ctx.profile().snapshot().await.index_collections().is_empty());
    }

    #[tokio::test]
    async fn blank_conversation_is_skipped() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("{}"));
        let ctx = context(&dir, provider.clone());

        let outcome = ctx.update("   ").await;
        assert_eq!(outcome.status, Status::Skipped);
        assert_eq!(outcome.profile, serde_json::json!({}));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn conversation_facts_are_reconciled() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("{}")
                .on("DOCUMENT CONTENT", r#"{"fullName": "Jane Doe", "mobile": "555-0100"}"#)
                .on("CONVERSATION TEXT", r#"{"name": "Jane R. Doe", "phone": "555-0199"}"#),
        );
        let ctx = context(&dir, provider);
        let path = write(&dir, "id.txt", "Jane Doe 555-0100");
        ctx.ingest(&path).await;

        let outcome = ctx
            .update("Hi! Actually my name is Jane R. Doe and my number is 555-0199.")
            .await;
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(outcome.profile["fullName"], "Jane R. Doe");
        assert_eq!(outcome.profile["mobile"], "555-0199");
        assert!(outcome.profile.get("name").is_none());
        assert!(outcome.profile.get("phone").is_none());
    }
}
