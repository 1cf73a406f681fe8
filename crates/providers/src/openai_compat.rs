//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp, Together AI,
//! Groq and any OpenAI-compatible endpoint.
//!
//! Supports chat completions (optionally in JSON mode) and batched embeddings.

use async_trait::async_trait;
use quill_core::error::ProviderError;
use quill_core::message::Message;
use quill_core::provider::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Inputs sent per `/embeddings` call. Large documents are split across calls.
const EMBED_BATCH: usize = 64;

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        // Per-call deadlines are enforced by the collaborator
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Ollama ignores the key, so any placeholder works.
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    /// The `/chat/completions` body for a request.
    fn completion_body(request: &ProviderRequest) -> Value {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.format == ReplyFormat::Json {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// POST a JSON body and decode the JSON reply.
    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            429 => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5);
                return Err(ProviderError::RateLimited { retry_after_secs });
            }
            401 | 403 => {
                return Err(ProviderError::AuthenticationFailed(
                    "Invalid API key or insufficient permissions".into(),
                ));
            }
            404 => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::ModelNotFound(body));
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(provider = %self.name, status, body = %body, "Provider returned error");
                return Err(ProviderError::ApiError {
                    status_code: status,
                    message: body,
                });
            }
        }

        response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse {path} response: {e}"),
        })
    }
}

/// Embedding vectors in input order, whatever order the server listed them.
fn ordered_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[async_trait]
impl quill_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            format = ?request.format,
            "Sending completion request"
        );
        let api: ApiResponse = self
            .post("chat/completions", &Self::completion_body(&request))
            .await?;

        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: api.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api.model,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let mut embeddings = Vec::with_capacity(request.inputs.len());
        let mut model = request.model.clone();
        let mut prompt_tokens = 0;

        for batch in request.inputs.chunks(EMBED_BATCH) {
            debug!(
                provider = %self.name,
                model = %request.model,
                count = batch.len(),
                "Sending embedding request"
            );
            let body = json!({
                "model": request.model,
                "input": batch,
                "encoding_format": "float",
            });
            let api: EmbeddingApiResponse = self.post("embeddings", &body).await?;
            if api.data.len() != batch.len() {
                return Err(ProviderError::ApiError {
                    status_code: 200,
                    message: format!(
                        "expected {} embeddings in batch, got {}",
                        batch.len(),
                        api.data.len()
                    ),
                });
            }
            prompt_tokens += api.usage.map(|u| u.prompt_tokens).unwrap_or(0);
            model = api.model;
            embeddings.extend(ordered_embeddings(api.data));
        }

        Ok(EmbeddingResponse {
            embeddings,
            model,
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens: 0,
                total_tokens: prompt_tokens,
            }),
        })
    }
}

// --- Wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
}
