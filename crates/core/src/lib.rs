//! # Quill Core
//!
//! Domain types, collaborator traits, and error definitions for Quill, the
//! profile extraction and reconciliation service.
//! This crate has **no framework dependencies**. It defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (language model, document parser, semantic
//! index) is defined as a trait here. Implementations live in their
//! respective crates, and tests swap in scripted stand-ins.

pub mod document;
pub mod error;
pub mod index;
pub mod message;
pub mod profile;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use document::{DocumentParser, Segment};
pub use error::{Error, Result};
pub use index::{Chunk, IndexRef, SemanticIndex, Snippet};
pub use message::{Message, Role};
pub use profile::{FactSet, FieldIdentity, FieldValue, Profile};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ReplyFormat};
