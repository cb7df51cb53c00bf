//! Per-page text extraction and text-layer diagnostics for PDF uploads.
//!
//! Decoding is delegated to `pdf-extract`; everything downstream works on the
//! normalized page strings returned by [`extract_pages`]. Lengths and
//! densities count Unicode scalar values, not bytes.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Page text with no letters in at least this fraction is non-semantic.
pub const MIN_SEMANTIC_DENSITY: f64 = 0.15;
/// Pages longer than this with no common words are non-semantic.
const COMMON_WORD_MIN_LENGTH: usize = 50;
const COMMON_WORDS: &[&str] = &[
    "the", "and", "of", "to", "in", "a", "is", "it", "you", "that", "he", "was",
];

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static SPACE_BEFORE_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +\n").unwrap());
static SPACE_AFTER_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n +").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Decoded document: normalized text per page, in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPages {
    pub pages: Vec<String>,
}

impl ExtractedPages {
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page text by 1-based page number; out-of-range pages read as empty.
    pub fn page(&self, page_number: u32) -> &str {
        (page_number as usize)
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All pages joined by newlines.
    pub fn combined(&self) -> String {
        self.pages.join("\n")
    }
}

/// Extract normalized text for every page of a PDF.
pub fn extract_pages(bytes: &[u8]) -> Result<ExtractedPages, ExtractError> {
    let raw = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(ExtractedPages::from_pages(
        raw.iter().map(|p| normalize_text(p)).collect(),
    ))
}

/// Make extracted text readable and searchable.
///
/// Non-printable characters become spaces (newlines, carriage returns and
/// tabs survive), runs of spaces/tabs collapse, spaces hugging newlines
/// are dropped, blank-line runs are capped at one, and the result is trimmed.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => c,
            c if !is_printable(c) => ' ',
            c => c,
        })
        .collect();

    let s = HORIZONTAL_WS.replace_all(&cleaned, " ");
    let s = SPACE_BEFORE_NEWLINE.replace_all(&s, "\n");
    let s = SPACE_AFTER_NEWLINE.replace_all(&s, "\n");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Unicode `Cf` characters that show up in PDF text layers.
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    )
}

/// NBSP, the other `Zs` separators and the line/paragraph separators are
/// not printable; only the plain space is.
fn is_printable(c: char) -> bool {
    match c {
        ' ' | '\n' | '\r' | '\t' => true,
        c => !(c.is_control() || c.is_whitespace() || is_format_char(c)),
    }
}

/// Fraction of characters that are printable, over at least one character.
pub fn printable_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    let printable = text.chars().filter(|&c| is_printable(c)).count();
    printable as f64 / total.max(1) as f64
}

/// Text-layer verdict for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticQuality {
    pub non_semantic: bool,
    /// Letters divided by characters.
    pub density: f64,
    pub reason: String,
}

/// Judge whether page text carries words or is glyph noise.
pub fn assess_semantic_quality(page_text: &str) -> SemanticQuality {
    if page_text.is_empty() {
        return SemanticQuality {
            non_semantic: true,
            density: 0.0,
            reason: "empty_text".to_string(),
        };
    }

    let total = page_text.chars().count();
    let letters = page_text.chars().filter(|c| c.is_alphabetic()).count();
    let slashes = page_text.chars().filter(|&c| c == '/').count();
    let density = letters as f64 / total as f64;

    let lower = page_text.to_lowercase();
    let has_common_words = COMMON_WORDS.iter().any(|w| lower.contains(w));

    let verdict = |non_semantic: bool, reason: String| SemanticQuality {
        non_semantic,
        density,
        reason,
    };

    if density < MIN_SEMANTIC_DENSITY {
        return verdict(
            true,
            format!("semantic_density_{:.4}_below_{}", density, MIN_SEMANTIC_DENSITY),
        );
    }
    if slashes > letters {
        return verdict(
            true,
            format!("slash_count_{}_exceeds_letter_count_{}", slashes, letters),
        );
    }
    if !has_common_words && total > COMMON_WORD_MIN_LENGTH {
        return verdict(true, "no_common_words_detected".to_string());
    }
    verdict(false, "semantic".to_string())
}

/// Round to four decimal places for stored diagnostics.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
