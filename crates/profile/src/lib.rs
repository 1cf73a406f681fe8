//! Canonical user profile for Quill.
//!
//! - [`categories`]: declarative field-name categories used by tier 2
//! - [`reconcile`]: the tiered merge of candidate facts into a profile
//! - [`store`]: the durable, single-writer profile store

pub mod categories;
pub mod reconcile;
pub mod store;

pub use categories::{CATEGORIES, Category, classify};
pub use reconcile::{MatchTier, MergeDecision, MergeReport, Reconciler};
pub use store::{MergeOutcome, ProfileStore};
