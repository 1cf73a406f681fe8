//! Fact extraction through the language-model collaborator.
//!
//! Documents and conversations use different instructions. The reply is
//! scanned for the first top-level JSON object; if it does not parse, one
//! repair pass (quote normalization, unquoted keys) is attempted. Any
//! failure degrades to an empty object.

use crate::chunker::stitch;
use futures::future::join_all;
use quill_core::error::{ExtractionError, ProviderError};
use quill_core::index::Chunk;
use quill_providers::Collaborator;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static UNQUOTED_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([{,])\s*([A-Za-z0-9_]+)\s*:").ok());

const DOCUMENT_INSTRUCTION: &str = "\
You are a data extraction specialist. Analyze the document content below.

TASK: Extract ALL information about the person it describes into a FLAT (non-nested) JSON object of key-value pairs.

GUIDELINES:
- Produce a SINGLE-LEVEL JSON object. No nested objects or arrays.
- Flatten structured data into combined keys: instead of {\"address\": {\"city\": \"Austin\"}} use {\"addressCity\": \"Austin\"}.
- Extract personal data (names, contact details, identification numbers).
- Extract financial information, dates, locations, measurements and quantities.
- Use specific, self-explanatory camelCase key names.
- Preserve values exactly as they appear.
- Exclude metadata, schema information, empty fields and placeholder text.
- If the same information appears more than once, use the most complete version.

DOCUMENT CONTENT:
";

const CONVERSATION_INSTRUCTION: &str = "\
You are a conversation analyst extracting user information from natural language.

TASK: Extract ALL personal information the user states about themselves as a JSON object of key-value pairs.

GUIDELINES:
- 'My name is Ken' becomes {\"name\": \"Ken\"}.
- Look for name, age, address, phone, email, occupation, income, dates and preferences.
- Use camelCase key names such as phoneNumber or dateOfBirth.
- Only extract information the person actually provided, not examples or hypotheticals.
- Ignore pleasantries, questions and other non-informational content.
- If a fact is mentioned more than once, use the most recent mention.

CONVERSATION TEXT:
";

/// Which extraction instruction to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    Document,
    Conversation,
}

impl ExtractionMode {
    fn instruction(self, text: &str) -> String {
        match self {
            Self::Document => {
                format!("{DOCUMENT_INSTRUCTION}{text}\n\nOUTPUT (FLAT JSON ONLY):")
            }
            Self::Conversation => {
                format!("{CONVERSATION_INSTRUCTION}{text}\n\nOUTPUT (JSON only):")
            }
        }
    }
}

/// Turns text into a JSON object of candidate facts.
pub struct FactExtractor {
    collaborator: Collaborator,
    max_context_chars: usize,
}

impl FactExtractor {
    pub fn new(collaborator: Collaborator) -> Self {
        Self {
            collaborator,
            max_context_chars: 24_000,
        }
    }

    /// Upper bound on text per extraction request; longer documents are
    /// split into several requests.
    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max.max(1);
        self
    }

    /// Extract facts from document chunks. Zero chunks yield no facts.
    ///
    /// Oversized documents are sent in batches concurrently; later batches
    /// win on key collisions.
    pub async fn extract_document(&self, chunks: &[Chunk]) -> Map<String, Value> {
        if chunks.is_empty() {
            warn!("No chunks provided for extraction");
            return Map::new();
        }

        let batches = self.batch(chunks);
        debug!(chunks = chunks.len(), batches = batches.len(), "Extracting document facts");

        let results = join_all(
            batches
                .iter()
                .map(|text| self.extract_text(text, ExtractionMode::Document)),
        )
        .await;

        let mut facts = Map::new();
        for result in results {
            facts.extend(result);
        }
        facts
    }

    /// Extract facts a user states in free-form conversation.
    pub async fn extract_conversation(&self, text: &str) -> Map<String, Value> {
        if text.trim().is_empty() {
            return Map::new();
        }
        self.extract_text(text, ExtractionMode::Conversation).await
    }

    async fn extract_text(&self, text: &str, mode: ExtractionMode) -> Map<String, Value> {
        match self.try_extract(text, mode).await {
            Ok(facts) => {
                info!(fields = facts.len(), ?mode, "Extracted facts");
                facts
            }
            Err(e) => {
                warn!(error = %e, ?mode, "Extraction failed, continuing with no new facts");
                Map::new()
            }
        }
    }

    /// Like the public extractors, but surfaces the failure reason.
    pub async fn try_extract(
        &self,
        text: &str,
        mode: ExtractionMode,
    ) -> Result<Map<String, Value>, ExtractionError> {
        let raw = self
            .collaborator
            .ask_json(&mode.instruction(text))
            .await
            .map_err(|e| match e {
                ProviderError::Timeout(_) => {
                    ExtractionError::Timeout(self.collaborator.timeout().as_secs())
                }
                other => ExtractionError::Collaborator(other),
            })?;
        parse_response(&raw)
    }

    /// Group stitched chunk text into batches no longer than the limit.
    fn batch(&self, chunks: &[Chunk]) -> Vec<String> {
        let mut batches = Vec::new();
        let mut current: Vec<Chunk> = Vec::new();
        let mut current_chars = 0;

        for chunk in chunks {
            let len = chunk.text.chars().count();
            if !current.is_empty() && current_chars + len > self.max_context_chars {
                batches.push(stitch(&current));
                current.clear();
                current_chars = 0;
            }
            current_chars += len;
            current.push(chunk.clone());
        }
        if !current.is_empty() {
            batches.push(stitch(&current));
        }
        batches
    }
}

/// Parse a collaborator reply into a JSON object.
///
/// Surrounding commentary and code fences are ignored. One repair pass is
/// attempted before giving up.
pub fn parse_response(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    let candidate = first_object(raw).ok_or(ExtractionError::NoJsonObject)?;

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(first) => {
            debug!(error = %first, "Reply is not valid JSON, attempting repair");
            serde_json::from_str::<Value>(&repair(candidate))
                .map_err(|e| ExtractionError::Malformed(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractionError::NotAnObject),
    }
}

/// Normalize single quotes and quote bare keys.
pub fn repair(candidate: &str) -> String {
    let quoted = candidate.replace('\'', "\"");
    match UNQUOTED_KEY.as_ref() {
        Some(re) => re.replace_all(&quoted, "$1\"$2\":").into_owned(),
        None => quoted,
    }
}

/// Locate the first top-level `{...}` span.
///
/// Braces inside double-quoted strings are skipped. If the object never
/// closes, the span runs to the last `}` in the text.
fn first_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
