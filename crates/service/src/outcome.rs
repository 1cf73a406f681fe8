//! Structured results returned at the service boundary.
//!
//! Every call yields one of these, never a raw error. Failures carry an
//! [`ErrorPayload`] with a stable kind.

use quill_core::error::Error;
use quill_core::index::IndexRef;
use quill_core::profile::{FactSet, Profile};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    /// Facts were merged but the document could not be indexed
    PartialSuccess,
    /// Nothing to do (e.g. empty conversation text)
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorPayload {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

fn facts_json(facts: &FactSet) -> Value {
    Value::Object(facts.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub status: Status,
    pub message: String,
    pub extracted_facts: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl IngestOutcome {
    pub fn indexed(facts: &FactSet, index: IndexRef) -> Self {
        Self {
            status: Status::Success,
            message: "Document processed successfully".into(),
            extracted_facts: facts_json(facts),
            index: Some(index),
            error: None,
        }
    }

    pub fn unindexed(facts: &FactSet, error: &Error) -> Self {
        Self {
            status: Status::PartialSuccess,
            message: "Document processed but index creation failed".into(),
            extracted_facts: facts_json(facts),
            index: None,
            error: Some(error.into()),
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            status: Status::Error,
            message: "Document could not be processed".into(),
            extracted_facts: Value::Object(Default::default()),
            index: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub status: Status,
    pub message: String,
    pub extracted_facts: Value,
    pub profile: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl UpdateOutcome {
    pub fn merged(facts: &FactSet, profile: &Profile) -> Self {
        Self {
            status: Status::Success,
            message: format!("Merged {} extracted fields", facts.len()),
            extracted_facts: facts_json(facts),
            profile: profile.to_json(),
            error: None,
        }
    }

    pub fn skipped(profile: &Profile) -> Self {
        Self {
            status: Status::Skipped,
            message: "Empty conversation text, no update performed".into(),
            extracted_facts: Value::Object(Default::default()),
            profile: profile.to_json(),
            error: None,
        }
    }

    pub fn failed(profile: &Profile, error: &Error) -> Self {
        Self {
            status: Status::Error,
            message: "Profile could not be updated".into(),
            extracted_facts: Value::Object(Default::default()),
            profile: profile.to_json(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl QueryOutcome {
    pub fn answered(response: String, cached: bool) -> Self {
        Self {
            status: Status::Success,
            response: Some(response),
            cached,
            error: None,
        }
    }

    pub fn failed(error: &Error) -> Self {
        Self {
            status: Status::Error,
            response: None,
            cached: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::error::{IndexError, ParseError};
    use quill_core::profile::FieldValue;

    #[test]
    fn partial_success_keeps_facts() {
        let mut facts = FactSet::new();
        facts.insert("name".into(), FieldValue::from("Jane"));
        let error = Error::from(IndexError::Embedding("offline".into()));

        let json = serde_json::to_value(IngestOutcome::unindexed(&facts, &error)).unwrap();
        assert_eq!(json["status"], "partial_success");
        assert_eq!(json["extracted_facts"]["name"], "Jane");
        assert_eq!(json["error"]["kind"], "index_error");
        assert!(json.get("index").is_none());
    }

    #[test]
    fn failures_are_structured() {
        let error = Error::from(ParseError::Unsupported {
            extension: "xlsx".into(),
        });
        let json = serde_json::to_value(QueryOutcome::failed(&error)).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "parse_error");
        assert!(json["error"]["message"].as_str().unwrap().contains("xlsx"));
    }
}
