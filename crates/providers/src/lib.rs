//! LLM Provider implementations for Quill.
//!
//! All providers implement the `quill_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! `Collaborator` is the bounded handle the pipeline actually calls.

pub mod collaborator;
pub mod mock;
pub mod openai_compat;
pub mod router;

pub use collaborator::Collaborator;
pub use mock::{ScriptedProvider, SequentialMockProvider};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
