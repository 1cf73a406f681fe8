//! Profile domain types.
//!
//! The profile is a single-level map from canonical field name to a scalar
//! value. Entries whose value is a `vector_db/<collection>` location are
//! pointer entries: they reference a semantic index rather than a fact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved path prefix marking a pointer entry's value.
pub const POINTER_PREFIX: &str = "vector_db";

/// Build the logical location of a semantic index collection.
pub fn pointer_location(collection: &str) -> String {
    format!("{POINTER_PREFIX}/{collection}")
}

/// Whether a string value follows the pointer-entry convention.
pub fn is_pointer_value(value: &str) -> bool {
    value
        .strip_prefix(POINTER_PREFIX)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

/// The collection a pointer value refers to.
pub fn pointer_collection(value: &str) -> Option<&str> {
    value
        .strip_prefix(POINTER_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

/// Lowercased, alphanumeric-only form of a field name.
///
/// Two names are exact matches iff their normalized forms are equal.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A scalar profile value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON scalar. Nulls, arrays and objects yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// True if this value is a semantic index location.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Text(s) if is_pointer_value(s))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// Facts freshly extracted from one document or conversation.
///
/// Transient: never persisted except through reconciliation.
pub type FactSet = BTreeMap<String, FieldValue>;

/// A field's canonical name, the raw name it arrived under, and its
/// normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIdentity {
    pub canonical: String,
    pub raw: String,
    pub normalized: String,
}

impl FieldIdentity {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            canonical: raw.trim().to_string(),
            normalized: normalize(&raw),
            raw,
        }
    }

    pub fn matches_exactly(&self, other: &FieldIdentity) -> bool {
        !self.normalized.is_empty() && self.normalized == other.normalized
    }
}

/// The canonical user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile {
    fields: BTreeMap<String, FieldValue>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Ordinary facts, excluding pointer entries.
    pub fn facts(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter().filter(|(_, v)| !v.is_pointer())
    }

    /// Pointer entries only.
    pub fn pointers(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter().filter(|(_, v)| v.is_pointer())
    }

    /// Collections referenced by pointer entries, in key order.
    pub fn index_collections(&self) -> Vec<String> {
        self.pointers()
            .filter_map(|(_, v)| match v {
                FieldValue::Text(s) => pointer_collection(s).map(String::from),
                _ => None,
            })
            .collect()
    }

    pub fn is_pointer_field(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(FieldValue::is_pointer)
    }

    /// Render the profile as `key: value` lines, one per field.
    pub fn to_key_value_text(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, FieldValue)> for Profile {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
