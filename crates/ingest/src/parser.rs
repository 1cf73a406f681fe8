//! Built-in document parsers and the extension registry.
//!
//! Plain text, JSON and CSV are handled here. PDF, Word and image readers
//! are external and join through `ParserRegistry::register`.

use crate::flatten::flatten_value;
use quill_core::document::{DocumentParser, Segment};
use quill_core::error::ParseError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_text(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParseError::NotFound(path.to_path_buf()),
        _ => ParseError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// `.txt` and `.md` files. Form feeds split pages.
pub struct TextParser;

impl DocumentParser for TextParser {
    fn extensions(&self) -> &[&'static str] {
        &["txt", "md"]
    }

    fn parse(&self, path: &Path) -> Result<Vec<Segment>, ParseError> {
        let text = read_text(path)?;
        let source = source_name(path);
        Ok(text
            .split('\u{000C}')
            .enumerate()
            .map(|(i, page)| Segment::new(page, source.clone()).with_page(i + 1))
            .collect())
    }
}

/// `.json` files, rendered as flattened `key: value` lines.
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn parse(&self, path: &Path) -> Result<Vec<Segment>, ParseError> {
        let text = read_text(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ParseError::Unreadable {
                path: path.to_path_buf(),
                reason: format!("invalid JSON: {e}"),
            })?;

        let lines = flatten_value(&value)
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(vec![Segment::new(lines, source_name(path)).with_page(1)])
    }
}

/// `.csv` files. The first record is the header; every following record
/// becomes one segment of `header: value` lines.
pub struct CsvParser;

impl DocumentParser for CsvParser {
    fn extensions(&self) -> &[&'static str] {
        &["csv"]
    }

    fn parse(&self, path: &Path) -> Result<Vec<Segment>, ParseError> {
        let text = read_text(path)?;
        let mut records = split_records(&text).into_iter();
        let Some(headers) = records.next() else {
            return Ok(Vec::new());
        };

        let source = source_name(path);
        Ok(records
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .enumerate()
            .map(|(i, row)| {
                let body = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
                    .collect::<Vec<_>>()
                    .join("\n");
                Segment::new(body, source.clone()).with_page(i + 1)
            })
            .collect())
    }
}

/// Split CSV text into records, honoring quoted fields with embedded
/// commas, doubled quotes and newlines.
fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Parsers keyed by lowercase file extension.
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register a parser for every extension it claims. Later registrations
    /// replace earlier ones for the same extension.
    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        for ext in parser.extensions() {
            self.parsers.insert(ext.to_string(), parser.clone());
        }
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.parsers.contains_key(&extension.to_lowercase())
    }

    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.parsers.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Parse `path` with the parser registered for its extension.
    pub fn parse(&self, path: &Path) -> Result<Vec<Segment>, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let parser = self
            .parsers
            .get(&extension)
            .ok_or_else(|| ParseError::Unsupported {
                extension: extension.clone(),
            })?;

        let segments = parser.parse(path)?;
        debug!(path = %path.display(), segments = segments.len(), "Parsed document");
        Ok(segments)
    }
}

impl Default for ParserRegistry {
    /// Registry with the built-in text, JSON and CSV parsers.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(TextParser));
        registry.register(Arc::new(JsonParser));
        registry.register(Arc::new(CsvParser));
        registry
    }
}
