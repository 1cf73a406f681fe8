//! Document ingestion pipeline for Quill.
//!
//! parse → chunk → extract → flatten. Each stage is usable on its own; the
//! service crate wires them onto its worker pools.

pub mod chunker;
pub mod extractor;
pub mod flatten;
pub mod parser;

pub use chunker::{Chunker, stitch};
pub use extractor::{ExtractionMode, FactExtractor, parse_response};
pub use flatten::{flatten, flatten_value, unflatten};
pub use parser::{CsvParser, JsonParser, ParserRegistry, TextParser};
