//! Credit inquiry parser.
//!
//! Looks for an `Inquiries` header on each page and walks the lines below it
//! until the next section header. Every line carrying a date opens one
//! inquiry block; the subscriber is taken from a `Subscriber:`/`Member:`
//! style label on that line or one of the next three, falling back to the
//! first non-date text that looks like a name.

use regex::Regex;
use std::sync::LazyLock;

use crate::identity::normalize_whitespace;

static INQUIRIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\binquiries\b").unwrap());
static SECTION_STOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(tradelines|accounts|collections|public records|personal information|summary)\b")
        .unwrap()
});
static DATE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap(),
        Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b").unwrap(),
        Regex::new(r"\b(\d{1,2}-\d{1,2}-\d{2,4})\b").unwrap(),
    ]
});
static ISO_DATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static SHORT_DATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap());
static SUBSCRIBER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(subscriber|member|company|creditor)\b").unwrap());
static SUBSCRIBER_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:subscriber|member|company|creditor)\s*[:\-]?\s*(.+)").unwrap()
});

const SUBSCRIBER_SCAN_LINES: usize = 4;
const MAX_SUBSCRIBER_CHARS: usize = 120;
const MIN_SUBSCRIBER_CHARS: usize = 4;

/// One inquiry block found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inquiry {
    /// 1-based page the block was read from.
    pub page: u32,
    /// 0-based position of the block within its page.
    pub block: usize,
    pub date: String,
    pub subscriber: Option<String>,
}

impl Inquiry {
    /// Entity discriminator shared by every field of this inquiry.
    pub fn entity_id(&self) -> String {
        format!("inquiry:{}:{}", self.page, self.block)
    }
}

pub fn extract_inquiries(pages: &[String]) -> Vec<Inquiry> {
    let mut found = Vec::new();
    for (i, text) in pages.iter().enumerate() {
        found.extend(page_inquiries(i as u32 + 1, text));
    }
    found
}

fn page_inquiries(page: u32, text: &str) -> Vec<Inquiry> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(header) = lines.iter().position(|l| INQUIRIES_RE.is_match(l)) else {
        return Vec::new();
    };

    let mut inquiries = Vec::new();
    for (i, raw) in lines.iter().enumerate().skip(header + 1) {
        let line = raw.trim();
        if SECTION_STOP_RE.is_match(line) {
            break;
        }
        let Some(date) = find_date(line) else {
            continue;
        };
        inquiries.push(Inquiry {
            page,
            block: inquiries.len(),
            date,
            subscriber: find_subscriber(&lines[i..]),
        });
    }
    inquiries
}

fn find_date(line: &str) -> Option<String> {
    DATE_PATTERNS
        .iter()
        .find_map(|re| re.captures(line).map(|c| c[1].to_string()))
}

/// Subscriber for the block whose date is on `following[0]`.
fn find_subscriber(following: &[&str]) -> Option<String> {
    for raw in following.iter().take(SUBSCRIBER_SCAN_LINES) {
        let candidate = raw.trim();
        if SECTION_STOP_RE.is_match(candidate) {
            break;
        }
        let without_dates = ISO_DATE_TOKEN_RE.replace_all(candidate, "");
        let without_dates = SHORT_DATE_TOKEN_RE.replace_all(without_dates.trim(), "");
        let cleaned = without_dates.trim();
        if cleaned.is_empty() {
            continue;
        }

        if SUBSCRIBER_LABEL_RE.is_match(candidate) {
            let value = match SUBSCRIBER_VALUE_RE.captures(candidate) {
                Some(c) => normalize_whitespace(&c[1]),
                None => cleaned.to_string(),
            };
            return Some(truncate_chars(&value, MAX_SUBSCRIBER_CHARS));
        }
        if cleaned.chars().count() >= MIN_SUBSCRIBER_CHARS
            && cleaned.chars().any(|c| c.is_ascii_alphabetic())
        {
            return Some(truncate_chars(cleaned, MAX_SUBSCRIBER_CHARS));
        }
    }
    None
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
