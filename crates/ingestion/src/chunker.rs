//! Token-window chunking
//!
//! Splits a document's text into overlapping fixed-size token windows with
//! page provenance. Chunking is a pure function of document content: the same
//! document always yields the same chunk ids and texts, which is what makes
//! re-indexing an upsert.
//!
//! Windows prefer to end at a sentence boundary found within a small lookback
//! region at the window edge; otherwise they cut hard at the window size.
//! Window `i+1` starts `overlap` tokens before window `i` ended, so
//! consecutive chunks always share exactly `overlap` tokens - with hard cuts
//! this is the same as starting window `i` at `i * (window - overlap)`.

use docqa_common::config::ChunkingConfig;
use docqa_common::errors::Result;
use docqa_common::models::{Chunk, Document};
use docqa_common::tokenizer::Tokenizer;
use std::sync::Arc;
use tracing::debug;

/// One token piece tagged with the page it came from
struct Piece {
    text: String,
    page: u32,
}

/// Document chunker
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    window_tokens: usize,
    overlap_tokens: usize,
    lookback_tokens: usize,
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: &ChunkingConfig) -> Self {
        let window_tokens = config.window_tokens.max(1);
        let overlap_tokens = ((window_tokens as f64 * config.overlap_fraction).floor() as usize)
            .min(window_tokens.saturating_sub(1));
        let lookback_tokens =
            (window_tokens as f64 * config.boundary_lookback_fraction).floor() as usize;

        Self {
            tokenizer,
            window_tokens,
            overlap_tokens,
            lookback_tokens,
        }
    }

    /// Tokens shared between consecutive chunks
    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// The tokenizer chunk sizes are denominated in
    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    /// Split a document into overlapping chunks.
    ///
    /// Windows never cross the document boundary. They may cross page
    /// boundaries; the recorded page is the page of the first token that
    /// carries visible text, so citations always point at a page that
    /// contains the start of the cited fragment.
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let pieces = self.tokenize_pages(document)?;
        let total = pieces.len();
        if total == 0 {
            debug!(document = %document.filename, "Document has no tokens, nothing to chunk");
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut sequence_index = 0usize;

        loop {
            let hard_end = (start + self.window_tokens).min(total);
            let end = if hard_end < total {
                self.boundary_end(&pieces, start, hard_end)
            } else {
                hard_end
            };

            let text: String = pieces[start..end].iter().map(|p| p.text.as_str()).collect();
            let page = pieces[start..end]
                .iter()
                .find(|p| !p.text.trim().is_empty())
                .map(|p| p.page)
                .unwrap_or(pieces[start].page);

            chunks.push(Chunk::new(
                &document.id,
                &document.filename,
                sequence_index,
                page,
                text,
                end - start,
            )?);
            sequence_index += 1;

            if end >= total {
                break;
            }
            // Overlap is measured from the actual end, so a window shortened
            // at a sentence boundary still shares exactly `overlap` tokens
            // with its successor.
            start = end.saturating_sub(self.overlap_tokens).max(start + 1);
        }

        debug!(
            document = %document.filename,
            tokens = total,
            chunk_count = chunks.len(),
            window = self.window_tokens,
            overlap = self.overlap_tokens,
            "Document chunked"
        );

        Ok(chunks)
    }

    /// Tokenize each page and concatenate, tagging every piece with its page.
    /// Pages are joined with a newline piece attributed to the earlier page.
    fn tokenize_pages(&self, document: &Document) -> Result<Vec<Piece>> {
        let mut pieces: Vec<Piece> = Vec::new();

        for page in &document.pages {
            let split = self.tokenizer.split(&page.raw_text)?;
            if split.is_empty() {
                continue;
            }
            if let Some(last) = pieces.last() {
                pieces.push(Piece {
                    text: "\n".to_string(),
                    page: last.page,
                });
            }
            for text in split {
                pieces.push(Piece {
                    text,
                    page: page.page_number,
                });
            }
        }

        Ok(pieces)
    }

    /// Find a sentence end inside the lookback region of `[start, hard_end)`,
    /// returning the (exclusive) window end to use. Falls back to `hard_end`.
    fn boundary_end(&self, pieces: &[Piece], start: usize, hard_end: usize) -> usize {
        let window_len = hard_end - start;
        let lookback = self.lookback_tokens.min(window_len.saturating_sub(1));
        if lookback == 0 {
            return hard_end;
        }

        let floor = hard_end - lookback;
        for idx in (floor..hard_end).rev() {
            if ends_sentence(&pieces[idx].text) {
                return idx + 1;
            }
        }
        hard_end
    }
}

/// Whether a token piece ends a sentence (terminator, possibly followed by
/// closing quotes/brackets and whitespace)
fn ends_sentence(piece: &str) -> bool {
    piece
        .trim_end()
        .trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}'])
        .ends_with(['.', '!', '?'])
}
