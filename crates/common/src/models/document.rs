//! Document and page entities produced by extraction

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw text of a single page, owned exclusively by its document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,

    /// Extracted, cleaned text of the page
    pub raw_text: String,
}

/// An ingested document, immutable after extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content hash over filename and page texts.
    ///
    /// Stable across re-runs, so re-indexing the same content produces the
    /// same chunk ids and upserts instead of duplicating.
    pub id: String,

    /// Source file name (not the full path)
    pub filename: String,

    /// Pages in reading order
    pub pages: Vec<PageText>,

    /// When extraction produced this document
    pub extracted_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from extracted `(page_number, text)` pairs.
    ///
    /// Pages must be 1-based and strictly ascending.
    pub fn from_pages(filename: impl Into<String>, pages: Vec<(u32, String)>) -> Result<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(AppError::validation("document filename must not be empty"));
        }

        let mut last_page = 0u32;
        for (page_number, _) in &pages {
            if *page_number == 0 {
                return Err(AppError::validation("page numbers are 1-based"));
            }
            if *page_number <= last_page {
                return Err(AppError::validation(format!(
                    "page numbers must be strictly ascending (saw {} after {})",
                    page_number, last_page
                )));
            }
            last_page = *page_number;
        }

        let id = content_hash(&filename, &pages);
        let pages = pages
            .into_iter()
            .map(|(page_number, raw_text)| PageText {
                page_number,
                raw_text,
            })
            .collect();

        Ok(Self {
            id,
            filename,
            pages,
            extracted_at: Utc::now(),
        })
    }

    /// Total characters of extracted text across all pages
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.raw_text.len()).sum()
    }
}

/// Hex SHA-256 over filename and per-page content
fn content_hash(filename: &str, pages: &[(u32, String)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    for (page_number, text) in pages {
        hasher.update(page_number.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = Document::from_pages("a.pdf", vec![(1, "hello".into()), (2, "world".into())])
            .unwrap();
        let b = Document::from_pages("a.pdf", vec![(1, "hello".into()), (2, "world".into())])
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_content_hash_depends_on_content_and_name() {
        let a = Document::from_pages("a.pdf", vec![(1, "hello".into())]).unwrap();
        let b = Document::from_pages("a.pdf", vec![(1, "hello!".into())]).unwrap();
        let c = Document::from_pages("b.pdf", vec![(1, "hello".into())]).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_rejects_bad_page_numbers() {
        assert!(Document::from_pages("a.pdf", vec![(0, "x".into())]).is_err());
        assert!(
            Document::from_pages("a.pdf", vec![(2, "x".into()), (2, "y".into())]).is_err()
        );
        assert!(Document::from_pages("  ", vec![(1, "x".into())]).is_err());
    }
}
