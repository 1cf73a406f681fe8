//! Scripted providers for tests and offline runs.
//!
//! `ScriptedProvider` answers by matching substrings of the prompt, and
//! `SequentialMockProvider` replays a fixed list of replies in order. Both
//! embed text with a deterministic bag-of-words hash so the semantic index
//! works without a model.

use async_trait::async_trait;
use quill_core::error::ProviderError;
use quill_core::message::Message;
use quill_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const EMBEDDING_DIMS: usize = 64;

/// Embed text as a normalized bag-of-words hash vector.
pub fn hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % EMBEDDING_DIMS as u64) as usize] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

fn prompt_text(request: &ProviderRequest) -> String {
    request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn embed_all(request: EmbeddingRequest) -> EmbeddingResponse {
    EmbeddingResponse {
        embeddings: request.inputs.iter().map(|t| hash_embedding(t)).collect(),
        model: request.model,
        usage: None,
    }
}

/// A provider that replies according to prompt substrings.
///
/// Rules are checked in insertion order; the first rule whose needle occurs
/// in the prompt wins. Unmatched prompts get the fallback reply.
pub struct ScriptedProvider {
    rules: Vec<(String, String)>,
    fallback: String,
    delay: Option<Duration>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            fallback: fallback.into(),
            delay: None,
            failing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn on(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }

    /// Sleep before every completion.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every completion with a 500.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Every prompt seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = prompt_text(&request);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "scripted failure".into(),
            });
        }

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.as_str())
            .unwrap_or(&self.fallback);

        Ok(text_response(reply))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if self.failing {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "scripted failure".into(),
            });
        }
        Ok(embed_all(request))
    }
}

/// A provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue; calls past
/// the end fail with an API error.
pub struct SequentialMockProvider {
    replies: Vec<String>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: replies.into_iter().map(String::from).collect(),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap_or_else(PoisonError::into_inner);
        let reply = self.replies.get(*count).ok_or_else(|| ProviderError::ApiError {
            status_code: 500,
            message: format!(
                "no more responses (call #{}, have {})",
                *count,
                self.replies.len()
            ),
        })?;
        *count += 1;
        Ok(text_response(reply))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(embed_all(request))
    }
}
