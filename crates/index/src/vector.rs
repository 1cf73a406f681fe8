//! Similarity scoring for stored chunks.

use crate::store::StoredChunk;
use std::collections::HashSet;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1], or 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms present in `text`.
pub fn keyword_score(query: &str, text: &str) -> f32 {
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let text_terms = terms(text);
    let hits = query_terms.iter().filter(|t| text_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

/// Rank chunks by descending score, keeping at most `limit`.
///
/// With a query embedding, chunks are scored by cosine similarity; without
/// one, by keyword overlap. Ties keep document order.
pub fn rank<'a>(
    chunks: &'a [StoredChunk],
    query: &str,
    query_embedding: Option<&[f32]>,
    limit: usize,
) -> Vec<(f32, &'a StoredChunk)> {
    let mut scored: Vec<(f32, &StoredChunk)> = chunks
        .iter()
        .map(|chunk| {
            let score = match query_embedding {
                Some(q) => cosine_similarity(&chunk.embedding, q),
                None => keyword_score(query, &chunk.text),
            };
            (score, chunk)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
