//! Question answering over the profile and registered indexes.

use crate::cache::CacheKey;
use crate::context::ServiceContext;
use crate::history::format_history;
use crate::outcome::QueryOutcome;
use quill_core::document::join_segments;
use quill_core::error::{Error, ParseError};
use quill_core::index::Snippet;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub question: String,

    /// Raw text or a JSON array of `{type|role, content}` messages
    #[serde(default)]
    pub chat_history: String,

    /// A form to fill; switches the answer to a flat JSON object
    #[serde(default)]
    pub form_document: Option<PathBuf>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.chat_history = history.into();
        self
    }

    pub fn with_form(mut self, form: impl Into<PathBuf>) -> Self {
        self.form_document = Some(form.into());
        self
    }

    fn cache_key(&self) -> CacheKey {
        let form = self
            .form_document
            .as_ref()
            .map(|p| p.display().to_string());
        CacheKey::new(&self.question, &self.chat_history, form.as_deref())
    }
}

fn render_context(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(|s| format!("[{}] {}", s.source, s.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn answer_prompt(question: &str, profile: &str, context: &str, history: &str) -> String {
    let mut prompt = String::from(
        "You are Quill, a document assistant. Answer the question using the user \
         information, retrieved document context and chat history below. If the \
         answer is not there, say so.\n\n",
    );
    if !context.is_empty() {
        prompt.push_str(&format!("RETRIEVED CONTEXT:\n{context}\n\n"));
    }
    prompt.push_str(&format!("USER INFORMATION:\n{profile}\n\n"));
    if !history.is_empty() {
        prompt.push_str(&format!("CHAT HISTORY:\n{history}\n\n"));
    }
    prompt.push_str(&format!("QUESTION: {question}\n\nANSWER:"));
    prompt
}

fn form_prompt(question: &str, form: &str, profile: &str, context: &str, history: &str) -> String {
    format!(
        "You are Quill, an expert form-filling assistant. Generate a FLAT JSON object whose keys \
EXACTLY match the form field names and whose values come from the stored user information.

FORM TO COMPLETE:
{form}

USER PROFILE DATA:
{profile}

RETRIEVED CONTEXT:
{context}

CHAT HISTORY:
{history}

INSTRUCTIONS:
1. Include every field of the form using its exact name, even when the value is unknown.
2. Use '' for information that is not available. Do not guess.
3. Match the date, phone, address and currency formats the form asks for.
4. Output a single-level JSON object with no nested objects or arrays and no text around it.

QUESTION: {question}

ANSWER (FLAT JSON ONLY):"
    )
}

impl ServiceContext {
    /// Answer a question, optionally filling a form.
    ///
    /// A cache hit skips retrieval and generation entirely. With no indexes
    /// registered the answer uses the profile and history alone.
    pub async fn query(&self, request: &QueryRequest) -> QueryOutcome {
        match self.try_query(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Query failed");
                QueryOutcome::failed(&e)
            }
        }
    }

    async fn try_query(&self, request: &QueryRequest) -> Result<QueryOutcome, Error> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("Question must not be empty".into()));
        }

        let key = request.cache_key();
        if let Some(answer) = self.cache.get(&key).await {
            info!("Cache hit for query");
            return Ok(QueryOutcome::answered(answer, true));
        }

        let profile = self.profile.snapshot().await;
        let history = format_history(&request.chat_history);
        let collections = profile.index_collections();
        let snippets = self.index.retrieve(&collections, question).await;
        let context = render_context(&snippets);
        debug!(indexes = collections.len(), snippets = snippets.len(), "Query context assembled");

        let prompt = match &request.form_document {
            Some(form_path) => {
                let form = self.read_form(form_path).await?;
                let profile_json = serde_json::to_string_pretty(&profile.to_json())?;
                form_prompt(question, &form, &profile_json, &context, &history)
            }
            None => answer_prompt(question, &profile.to_key_value_text(), &context, &history),
        };

        let answer = self.collaborator.ask(&prompt).await?.trim().to_string();
        self.cache.insert(key, answer.clone()).await;
        Ok(QueryOutcome::answered(answer, false))
    }

    async fn read_form(&self, path: &std::path::Path) -> Result<String, Error> {
        let parsers = self.parsers.clone();
        let owned = path.to_path_buf();
        let segments = self
            .pools
            .run_cpu(move || -> Result<_, ParseError> { parsers.parse(&owned) })
            .await??;
        Ok(join_segments(&segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Status;
    use crate::test_helpers::{context, write};
    use quill_providers::ScriptedProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn prompt_sections_are_optional() {
        let prompt = answer_prompt("What is my phone?", "mobile: 555-0100", "", "");
        assert!(prompt.contains("USER INFORMATION:\nmobile: 555-0100"));
        assert!(!prompt.contains("RETRIEVED CONTEXT"));
        assert!(!prompt.contains("CHAT HISTORY"));
        assert!(prompt.ends_with("QUESTION: What is my phone?\n\nANSWER:"));
    }

    #[test]
    fn form_prompt_embeds_form() {
        let prompt = form_prompt("Fill it", "Name: ____", "{}", "", "");
        assert!(prompt.contains("FORM TO COMPLETE:\nName: ____"));
        assert!(prompt.contains("FLAT JSON"));
    }

    #[test]
    fn cache_key_includes_form() {
        let plain = QueryRequest::new("q").with_history("h");
        let form = QueryRequest::new("q").with_history("h").with_form("/tmp/f.txt");
        assert_ne!(plain.cache_key(), form.cache_key());
    }

    #[tokio::test]
    async fn answers_without_indexes_and_caches() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("I don't know.").on("QUESTION: What is my phone?", "555-0100"),
        );
        let ctx = context(&dir, provider.clone());
        let request = QueryRequest::new("What is my phone?");

        let first = ctx.query(&request).await;
        assert_eq!(first.status, Status::Success);
        assert_eq!(first.response.as_deref(), Some("555-0100"));
        assert!(!first.cached);

        let second = ctx.query(&request).await;
        assert!(second.cached);
        assert_eq!(second.response, first.response);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn different_history_is_a_different_key() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new("ok"));
        let ctx = context(&dir, provider.clone());

        ctx.query(&QueryRequest::new("q")).await;
        let outcome = ctx
            .query(&QueryRequest::new("q").with_history(r#"[{"type": "user", "content": "hello"}]"#))
            .await;
        assert!(!outcome.cached);
        assert_eq!(provider.call_count(), 2);
        assert!(provider.calls()[1].contains("Previous conversation:\nUser: hello"));
        assert_eq!(ctx.cache().len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_identical_queries_leave_one_entry() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("blue").with_delay(std::time::Duration::from_millis(20)),
        );
        let ctx = Arc::new(context(&dir, provider));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    ctx.query(&QueryRequest::new("Favorite color?").with_history("h"))
                        .await
                })
            })
            .collect();
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.status, Status::Success);
            assert_eq!(outcome.response.as_deref(), Some("blue"));
        }
        assert_eq!(ctx.cache().len().await, 1);
    }

    #[tokio::test]
    async fn retrieved_context_and_profile_reach_the_prompt() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("ok")
                .on("DOCUMENT CONTENT", r#"{"employer": "ACME Corp"}"#),
        );
        let ctx = context(&dir, provider.clone());
        let path = write(&dir, "w2.txt", "Employer ACME Corp pays wages");
        ctx.ingest(&path).await;

        ctx.query(&QueryRequest::new("Who is my employer?")).await;
        let prompt = provider.calls().last().cloned().unwrap();
        assert!(prompt.contains("RETRIEVED CONTEXT:\n[w2.txt] Employer ACME Corp pays wages"));
        assert!(prompt.contains("employer: ACME Corp"));
    }

    #[tokio::test]
    async fn form_fill_uses_the_form_text() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            ScriptedProvider::new("ok").on("FORM TO COMPLETE", r#"{"Full Name": "Jane Doe"}"#),
        );
        let ctx = context(&dir, provider.clone());
        let form = write(&dir, "application.txt", "Full Name: ________");

        let outcome = ctx
            .query(&QueryRequest::new("Fill out this form").with_form(&form))
            .await;
        assert_eq!(outcome.response.as_deref(), Some(r#"{"Full Name": "Jane Doe"}"#));
        assert!(provider.calls()[0].contains("Full Name: ________"));

        let missing = ctx
            .query(&QueryRequest::new("Fill out this form").with_form(dir.path().join("nope.txt")))
            .await;
        assert_eq!(missing.error.unwrap().kind, "parse_error");
    }

    #[tokio::test]
    async fn empty_question_and_collaborator_failure_are_structured() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedProvider::new("x").failing()));

        let outcome = ctx.query(&QueryRequest::new("  ")).await;
        assert_eq!(outcome.error.unwrap().kind, "invalid_request");

        let outcome = ctx.query(&QueryRequest::new("anything")).await;
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.error.unwrap().kind, "provider_error");
        assert!(ctx.cache().is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_releases_the_collaborator() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, Arc::new(ScriptedProvider::new("ok")));
        ctx.query(&QueryRequest::new("q")).await;
        ctx.shutdown().await;

        assert!(ctx.cache().is_empty().await);
        let outcome = ctx.query(&QueryRequest::new("q")).await;
        assert_eq!(outcome.status, Status::Error);
    }
}
