//! Error types for the Quill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Most of them are
//! recoverable: the component that calls a collaborator converts its error
//! into a degraded-but-valid result and only logs it.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Quill operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator transport ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Document parsing ---
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    // --- Fact extraction ---
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    // --- Reconciliation ---
    #[error("Reconciliation ambiguity: {0}")]
    Reconciliation(#[from] ReconciliationAmbiguity),

    // --- Semantic index ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Profile persistence ---
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Caller input ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Provider(_) => "provider_error",
            Error::Parse(_) => "parse_error",
            Error::Extraction(_) => "extraction_error",
            Error::Reconciliation(_) => "reconciliation_ambiguity",
            Error::Index(_) => "index_error",
            Error::Profile(_) => "profile_error",
            Error::Config { .. } => "config_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The document could not be turned into text segments.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file format: {extension}")]
    Unsupported { extension: String },

    #[error("Unreadable document {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

/// The extraction collaborator returned nothing usable.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("No JSON object found in collaborator response")]
    NoJsonObject,

    #[error("Malformed JSON after repair: {0}")]
    Malformed(String),

    #[error("Collaborator returned a non-object JSON value")]
    NotAnObject,

    #[error("Collaborator did not answer within {0}s")]
    Timeout(u64),

    #[error("Collaborator call failed: {0}")]
    Collaborator(#[from] ProviderError),
}

/// The collaborator's field mapping could not be used.
#[derive(Debug, Clone, Error)]
pub enum ReconciliationAmbiguity {
    #[error("Mapping response could not be parsed: {0}")]
    Unparseable(String),

    #[error("Mapping response has no 'mapping' object")]
    MissingMapping,

    #[error("Mapping request failed: {0}")]
    Collaborator(#[from] ProviderError),
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("No chunks to index for collection '{0}'")]
    Empty(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index storage error: {0}")]
    Storage(String),

    #[error("Collection not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("Failed to read profile at {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Failed to write profile at {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Profile at {} is not a flat JSON object", .0.display())]
    Corrupt(PathBuf),
}
