//! Overlapping character windows over parsed segments.
//!
//! Each segment is windowed independently, so a chunk never spans a page
//! boundary. Windows advance by `size - overlap` characters; the last window
//! of a segment may be shorter than `size`.

use quill_core::document::Segment;
use quill_core::index::Chunk;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` is clamped below `size`; a zero size is treated as 1.
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size - 1),
        }
    }

    pub fn from_config(config: &quill_config::ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split segments into ordered windows. Empty input yields no chunks.
    pub fn chunk(&self, segments: &[Segment]) -> Vec<Chunk> {
        let step = self.size - self.overlap;
        let mut chunks = Vec::new();

        for (segment_no, segment) in segments.iter().enumerate() {
            let chars: Vec<char> = segment.text.chars().collect();
            if chars.iter().all(|c| c.is_whitespace()) {
                continue;
            }

            let mut start = 0;
            loop {
                let end = (start + self.size).min(chars.len());
                chunks.push(Chunk {
                    index: chunks.len(),
                    segment: segment_no,
                    offset: start,
                    text: chars[start..end].iter().collect(),
                    source: segment.source.clone(),
                });
                if end == chars.len() {
                    break;
                }
                start += step;
            }
        }

        chunks
    }
}

/// Rebuild the text covered by `chunks`, dropping the overlapped prefix of
/// each window. Segments are separated by a blank line.
pub fn stitch(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    let mut covered: Option<(usize, usize)> = None; // (segment, end offset)

    for chunk in chunks {
        let len = chunk.text.chars().count();
        match covered {
            Some((segment, end)) if segment == chunk.segment => {
                let skip = end.saturating_sub(chunk.offset);
                text.extend(chunk.text.chars().skip(skip));
            }
            Some(_) => {
                text.push_str("\n\n");
                text.push_str(&chunk.text);
            }
            None => text.push_str(&chunk.text),
        }
        let end = chunk.offset + len;
        covered = Some(match covered {
            Some((segment, prev)) if segment == chunk.segment => (segment, prev.max(end)),
            _ => (chunk.segment, end),
        });
    }

    text
}
