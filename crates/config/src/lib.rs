//! Configuration loading, validation, and management for Quill.
//!
//! Loads configuration from `~/.quill/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.quill/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used for extraction, field equivalence and answers
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used to embed chunks for the semantic index
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub index: IndexConfig,

    /// Worker pools and caches
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    2048
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("chunking", &self.chunking)
            .field("extraction", &self.extraction)
            .field("profile", &self.profile)
            .field("index", &self.index)
            .field("runtime", &self.runtime)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Character windows sent to the extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    2000
}
fn default_chunk_overlap() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// How the reconciliation engine resolves fields the deterministic tiers
/// could not place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// One mapping request per ingestion batch
    #[default]
    BatchMapping,
    /// One yes/no request per (candidate, existing field) pair
    Pairwise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Collaborator calls that take longer than this count as failures
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub strategy: ReconcileStrategy,

    /// Upper bound on document text sent in a single extraction request
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_max_context_chars() -> usize {
    24_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            strategy: ReconcileStrategy::default(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Where the canonical profile JSON lives
    #[serde(default = "default_profile_path")]
    pub path: PathBuf,
}

fn default_profile_path() -> PathBuf {
    AppConfig::config_dir().join("uploads").join("user_info.json")
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            path: default_profile_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Root directory for persisted collections
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,

    /// Snippets retrieved per collection for a query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_index_dir() -> PathBuf {
    AppConfig::config_dir().join("vector_db")
}
fn default_top_k() -> usize {
    4
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// CPU-bound workers (0 = available cores)
    #[serde(default)]
    pub cpu_workers: usize,

    /// Concurrent collaborator calls (0 = twice the available cores)
    #[serde(default)]
    pub io_workers: usize,

    /// Maximum cached query responses
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    1024
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl RuntimeConfig {
    pub fn resolved_cpu_workers(&self) -> usize {
        if self.cpu_workers == 0 {
            available_cores()
        } else {
            self.cpu_workers
        }
    }

    pub fn resolved_io_workers(&self) -> usize {
        if self.io_workers == 0 {
            available_cores() * 2
        } else {
            self.io_workers
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cpu_workers: 0,
            io_workers: 0,
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.quill/config.toml).
    ///
    /// Environment overrides:
    /// - `QUILL_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `QUILL_PROVIDER`
    /// - `QUILL_MODEL`
    /// - `QUILL_PROFILE_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply the same environment overrides as [`AppConfig::load`].
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("QUILL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("QUILL_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("QUILL_MODEL") {
            self.default_model = model;
        }

        if let Ok(path) = std::env::var("QUILL_PROFILE_PATH") {
            self.profile.path = PathBuf::from(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".quill")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be > 0".into(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size".into(),
            ));
        }

        if self.extraction.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "extraction.timeout_secs must be > 0".into(),
            ));
        }

        if self.index.top_k == 0 {
            return Err(ConfigError::ValidationError("index.top_k must be > 0".into()));
        }

        Ok(())
    }

    /// The chat model for the default provider: its own `default_model` when
    /// set, the top-level one otherwise.
    pub fn active_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            chunking: ChunkingConfig::default(),
            extraction: ExtractionConfig::default(),
            profile: ProfileConfig::default(),
            index: IndexConfig::default(),
            runtime: RuntimeConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "ollama");
        assert_eq!(config.chunking.chunk_size, 2000);
        assert_eq!(config.chunking.chunk_overlap, 1000);
        assert_eq!(config.extraction.strategy, ReconcileStrategy::BatchMapping);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_paths_live_under_config_dir() {
        let config = AppConfig::default();
        assert!(config.profile.path.ends_with("uploads/user_info.json"));
        assert!(config.index.dir.ends_with("vector_db"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.profile.path, config.profile.path);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let config = AppConfig {
            chunking: ChunkingConfig {
                chunk_size: 100,
                chunk_overlap: 100,
            },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "ollama");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o-mini"

[extraction]
strategy = "pairwise"
timeout_secs = 30

[profile]
path = "/data/profile.json"

[providers.openai]
api_key = "sk-test"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.extraction.strategy, ReconcileStrategy::Pairwise);
        assert_eq!(config.extraction.timeout_secs, 30);
        assert_eq!(config.profile.path, PathBuf::from("/data/profile.json"));
        assert_eq!(config.index.top_k, 4);
        assert!(config.providers.contains_key("openai"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
                default_model: None,
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sk-other"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn worker_counts_resolve_from_cores() {
        let runtime = RuntimeConfig::default();
        assert!(runtime.resolved_cpu_workers() >= 1);
        assert_eq!(
            runtime.resolved_io_workers(),
            runtime.resolved_cpu_workers() * 2
        );

        let fixed = RuntimeConfig {
            cpu_workers: 3,
            io_workers: 5,
            cache_capacity: 10,
        };
        assert_eq!(fixed.resolved_cpu_workers(), 3);
        assert_eq!(fixed.resolved_io_workers(), 5);
    }

    #[test]
    fn provider_table_model_wins() {
        let mut config = AppConfig::default();
        assert_eq!(config.active_model(), config.default_model);

        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("qwen2.5:7b".into()),
            },
        );
        assert_eq!(config.active_model(), "qwen2.5:7b");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("ollama"));
        assert!(toml_str.contains("batch_mapping"));
    }
}
