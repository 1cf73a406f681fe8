//! Provider selection from configuration.
//!
//! Every configured `[providers.<name>]` table becomes an OpenAI-compatible
//! client; the default provider is always present, falling back to its
//! well-known base URL when it has no table of its own.

use crate::openai_compat::OpenAiCompatProvider;
use quill_config::AppConfig;
use quill_core::provider::Provider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct ProviderRouter {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.get(&self.default_provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let mut names: Vec<&String> = config.providers.keys().collect();
    if !config.providers.contains_key(&config.default_provider) {
        names.push(&config.default_provider);
    }

    for name in names {
        let table = config.providers.get(name);
        let api_key = table
            .and_then(|t| t.api_key.clone())
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let base_url = table
            .and_then(|t| t.api_url.clone())
            .unwrap_or_else(|| default_base_url(name));

        debug!(provider = %name, url = %base_url, "Registering provider");
        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)),
        );
    }

    router
}

/// Base URL for well-known OpenAI-compatible services. Unknown names are
/// assumed to be a local Ollama-compatible server.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "http://localhost:11434/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_config::ProviderConfig;

    #[test]
    fn default_provider_always_registered() {
        let router = build_from_config(&AppConfig::default());
        assert_eq!(router.default().unwrap().name(), "ollama");
        assert_eq!(router.names(), vec!["ollama"]);
    }

    #[test]
    fn configured_tables_are_registered_alongside_default() {
        let mut config = AppConfig {
            default_provider: "openai".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "vllm".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:8000/v1".into()),
                default_model: None,
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.names(), vec!["openai", "vllm"]);
        assert_eq!(router.default().unwrap().name(), "openai");
        assert!(router.get("missing").is_none());
    }

    #[test]
    fn well_known_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
        assert!(default_base_url("llama.cpp").contains("8080"));
    }
}
