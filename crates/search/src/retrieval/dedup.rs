//! Near-duplicate collapse for retrieved chunks
//!
//! Overlapping windows mean the same passage can come back several times with
//! nearly identical text. Results from the same filename+page whose token
//! sets overlap beyond a threshold are collapsed onto the first (and thus
//! highest-scoring) one.

use docqa_common::store::RetrievalResult;
use docqa_common::tokenizer::Tokenizer;
use std::collections::HashSet;

/// Collapse near-duplicates, preserving the input (descending-score) order.
///
/// The overlap ratio is containment against the smaller token set, so a short
/// window fully contained in a longer one counts as a duplicate.
pub(crate) fn collapse_overlapping(
    results: Vec<RetrievalResult>,
    tokenizer: &dyn Tokenizer,
    threshold: f32,
) -> Vec<RetrievalResult> {
    if results.len() <= 1 {
        return results;
    }

    let mut kept: Vec<(RetrievalResult, HashSet<String>)> = Vec::with_capacity(results.len());

    for result in results {
        let tokens = token_set(tokenizer, &result.text);
        let duplicate = kept.iter().any(|(existing, existing_tokens)| {
            existing.filename == result.filename
                && existing.page == result.page
                && overlap_ratio(&tokens, existing_tokens) > threshold
        });

        if !duplicate {
            kept.push((result, tokens));
        }
    }

    kept.into_iter().map(|(result, _)| result).collect()
}

/// Lowercased word-content tokens of `text`
fn token_set(tokenizer: &dyn Tokenizer, text: &str) -> HashSet<String> {
    tokenizer
        .split(text)
        .unwrap_or_default()
        .into_iter()
        .map(|piece| piece.trim().to_lowercase())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// |A ∩ B| / min(|A|, |B|)
fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / smaller as f32
}
