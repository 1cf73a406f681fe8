//! Document parsing boundary.
//!
//! A parser turns a file into ordered text segments. PDF, Word and image
//! readers live outside this workspace and plug in through `DocumentParser`.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One ordered piece of a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// The text content
    pub text: String,

    /// Where it came from (usually the file name)
    pub source: String,

    /// 1-based page or row number, if the format has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl Segment {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page: None,
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }
}

/// Converts a file into ordered text segments.
///
/// Parsing is blocking file I/O plus CPU work; callers run it on a worker
/// pool rather than on the async runtime.
pub trait DocumentParser: Send + Sync {
    /// Lowercase file extensions (without the dot) this parser accepts.
    fn extensions(&self) -> &[&'static str];

    /// Parse the file at `path`.
    fn parse(&self, path: &Path) -> Result<Vec<Segment>, ParseError>;
}

/// Join segments for extraction, marking page boundaries.
///
/// A single segment is returned as-is.
pub fn join_segments(segments: &[Segment]) -> String {
    if segments.len() == 1 {
        return segments[0].text.clone();
    }
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let page = s.page.unwrap_or(i + 1);
            format!("--- Page {page} ---\n{}", s.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
