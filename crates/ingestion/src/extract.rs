//! PDF text extraction
//!
//! The core consumes `(filename, [(page_number, text)])` per document; this
//! module is the collaborator that produces that shape from PDF files using
//! lopdf. Anything else that can produce a `Document` (plain text, HTML,
//! test fixtures) just implements `DocumentExtractor`.

use docqa_common::errors::{AppError, Result};
use docqa_common::models::Document;
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Pages with less cleaned text than this are skipped (title pages, images)
const MIN_PAGE_CHARS: usize = 50;

/// Trait for turning a source file into an extracted document
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Document>;
}

/// lopdf-based PDF extractor
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Document> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::Extraction {
                document: path.display().to_string(),
                message: "path has no file name".to_string(),
            })?;

        let doc = lopdf::Document::load(path).map_err(|e| AppError::Extraction {
            document: filename.clone(),
            message: format!("failed to load PDF: {}", e),
        })?;

        let page_count = doc.get_pages().len() as u32;
        debug!(document = %filename, page_count, "Extracting text from PDF");

        let mut pages = Vec::new();
        for page_number in 1..=page_count {
            match doc.extract_text(&[page_number]) {
                Ok(text) => {
                    let cleaned = clean_text(&text);
                    if cleaned.len() < MIN_PAGE_CHARS {
                        debug!(page = page_number, "Skipping page with too little text");
                        continue;
                    }
                    pages.push((page_number, cleaned));
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "Failed to extract page, skipping");
                }
            }
        }

        if pages.is_empty() {
            return Err(AppError::Extraction {
                document: filename,
                message: "no text content extracted; the PDF may be scanned (OCR needed)"
                    .to_string(),
            });
        }

        Document::from_pages(filename, pages)
    }
}

/// Clean extracted PDF text of common artifacts: soft hyphens, per-line
/// padding, and runs of blank lines.
pub fn clean_text(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"));

    let text = text.replace('\u{00ad}', "");

    let trimmed_lines: Vec<&str> = text.lines().map(|line| line.trim()).collect();
    let text = trimmed_lines.join("\n");

    blank_runs.replace_all(&text, "\n\n").trim().to_string()
}
