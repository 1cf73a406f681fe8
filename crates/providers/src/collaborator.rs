//! The language-model collaborator as the pipeline sees it.
//!
//! Wraps a `Provider` handle with the model settings, a per-call deadline
//! and an optional I/O permit pool. Every extraction, equivalence, mapping
//! and answer request goes through `ask`.

use quill_core::error::ProviderError;
use quill_core::message::Message;
use quill_core::provider::{EmbeddingRequest, Provider, ProviderRequest, ReplyFormat};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A bounded, deadline-enforcing handle on the language model.
#[derive(Clone)]
pub struct Collaborator {
    provider: Arc<dyn Provider>,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
    permits: Option<Arc<Semaphore>>,
}

impl Collaborator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            embedding_model: "nomic-embed-text".into(),
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(120),
            permits: None,
        }
    }

    /// Build from the application config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &quill_config::AppConfig) -> Self {
        Self::new(provider, config.active_model())
            .with_embedding_model(&config.embedding_model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(Duration::from_secs(config.extraction.timeout_secs))
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Gate every call on a permit from the shared I/O pool.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn acquire(&self) -> Result<Option<tokio::sync::OwnedSemaphorePermit>, ProviderError> {
        match &self.permits {
            Some(permits) => permits
                .clone()
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| ProviderError::NotConfigured("I/O worker pool is shut down".into())),
            None => Ok(None),
        }
    }

    /// Send a single instruction and return the raw reply text.
    pub async fn ask(&self, instruction: &str) -> Result<String, ProviderError> {
        self.send(instruction, ReplyFormat::Text).await
    }

    /// Like [`Collaborator::ask`], but asks the backend for a JSON object.
    ///
    /// The reply is still raw text; callers parse it leniently.
    pub async fn ask_json(&self, instruction: &str) -> Result<String, ProviderError> {
        self.send(instruction, ReplyFormat::Json).await
    }

    async fn send(&self, instruction: &str, format: ReplyFormat) -> Result<String, ProviderError> {
        let _permit = self.acquire().await?;

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(instruction)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            format,
        };

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            prompt_chars = instruction.len(),
            ?format,
            "Asking collaborator"
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Ok(response.message.content),
            Ok(Err(e)) => {
                warn!(provider = %self.provider.name(), error = %e, "Collaborator call failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    provider = %self.provider.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Collaborator call timed out"
                );
                Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                )))
            }
        }
    }

    /// Embed texts with the configured embedding model.
    pub async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, ProviderError> {
        let _permit = self.acquire().await?;
        let expected = inputs.len();
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            inputs,
        };

        let response = tokio::time::timeout(self.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "Embedding request timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if response.embeddings.len() != expected {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: format!(
                    "expected {expected} embeddings, got {}",
                    response.embeddings.len()
                ),
            });
        }
        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedProvider;

    #[tokio::test]
    async fn ask_returns_reply_text() {
        let provider = Arc::new(ScriptedProvider::new("hello back"));
        let collaborator = Collaborator::new(provider.clone(), "mock");
        assert_eq!(collaborator.ask("hello").await.unwrap(), "hello back");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn instruction_is_the_only_message() {
        let provider = Arc::new(ScriptedProvider::new("{}"));
        let collaborator = Collaborator::new(provider.clone(), "mock");
        collaborator.ask_json("question").await.unwrap();
        assert_eq!(provider.calls(), vec!["question".to_string()]);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider =
            Arc::new(ScriptedProvider::new("late").with_delay(Duration::from_secs(3600)));
        let collaborator =
            Collaborator::new(provider, "mock").with_timeout(Duration::from_millis(50));
        let err = collaborator.ask("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn closed_pool_is_reported() {
        let permits = Arc::new(Semaphore::new(1));
        permits.close();
        let collaborator = Collaborator::new(Arc::new(ScriptedProvider::new("x")), "mock")
            .with_permits(permits);
        let err = collaborator.ask("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    struct FormatEcho;

    #[async_trait::async_trait]
    impl Provider for FormatEcho {
        fn name(&self) -> &str {
            "format_echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<quill_core::provider::ProviderResponse, ProviderError> {
            Ok(quill_core::provider::ProviderResponse {
                message: Message::assistant(format!("{:?}", request.format)),
                usage: None,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn ask_json_requests_json_replies() {
        let collaborator = Collaborator::new(Arc::new(FormatEcho), "mock");
        assert_eq!(collaborator.ask_json("facts?").await.unwrap(), "Json");
        assert_eq!(collaborator.ask("answer?").await.unwrap(), "Text");
    }

    #[tokio::test]
    async fn embed_checks_vector_count() {
        let collaborator = Collaborator::new(Arc::new(ScriptedProvider::new("x")), "mock");
        let vectors = collaborator
            .embed(vec!["a b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }
}
