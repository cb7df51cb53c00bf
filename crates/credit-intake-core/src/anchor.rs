//! Provenance anchoring of extracted values.
//!
//! An [`Anchor`] binds a value to the page text it was read from: up to
//! [`ANCHOR_CONTEXT_CHARS`] characters of context on each side of the first
//! verbatim occurrence, plus a SHA-256 over `before + value + after`. A value
//! that cannot be located verbatim still gets a hash of the bare value, so
//! any later edit to a stored value is detectable.
//!
//! # Example
//!
//! ```rust
//! use credit_intake_core::anchor::compute_anchor;
//! use credit_intake_core::models::AnchorStrength;
//!
//! let anchor = compute_anchor("Name: John Smith lives at 1 Main St", "John Smith");
//! assert_eq!(anchor.anchor_strength, AnchorStrength::Strong);
//! assert_eq!(anchor.anchor_text_before, "Name: ");
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Anchor, AnchorStrength};

/// Maximum characters of context captured on each side of a match.
pub const ANCHOR_CONTEXT_CHARS: usize = 30;

/// Compute the anchor for `raw_value` as found in `page_text`.
///
/// Never fails: empty inputs produce the `none` anchor.
pub fn compute_anchor(page_text: &str, raw_value: &str) -> Anchor {
    if raw_value.is_empty() {
        return Anchor::none();
    }

    if let Some(idx) = page_text.find(raw_value) {
        let before = last_chars(&page_text[..idx], ANCHOR_CONTEXT_CHARS);
        let after = first_chars(&page_text[idx + raw_value.len()..], ANCHOR_CONTEXT_CHARS);

        let mut snippet = String::with_capacity(before.len() + raw_value.len() + after.len());
        snippet.push_str(before);
        snippet.push_str(raw_value);
        snippet.push_str(after);

        return Anchor {
            anchor_text_before: before.to_string(),
            anchor_text_after: after.to_string(),
            anchor_hash: sha256_hex(snippet.as_bytes()),
            anchor_strength: AnchorStrength::Strong,
        };
    }

    Anchor {
        anchor_text_before: String::new(),
        anchor_text_after: String::new(),
        anchor_hash: sha256_hex(raw_value.as_bytes()),
        anchor_strength: AnchorStrength::Weak,
    }
}

/// Byte-input variant of [`compute_anchor`]. Invalid UTF-8 sequences are
/// replaced with U+FFFD before matching.
pub fn compute_anchor_bytes(page_text: &[u8], raw_value: &[u8]) -> Anchor {
    compute_anchor(
        &String::from_utf8_lossy(page_text),
        &String::from_utf8_lossy(raw_value),
    )
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let start = s
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

fn first_chars(s: &str, n: usize) -> &str {
    let end = s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_match_is_strong_with_bounded_context() {
        let page = "CONSUMER INFORMATION\nName: John Smith lives at 26 MAIN ST E, STEWIACKE NS B0N 2J0";
        let anchor = compute_anchor(page, "John Smith");
        assert_eq!(anchor.anchor_strength, AnchorStrength::Strong);
        assert!(!anchor.anchor_hash.is_empty());
        assert!(anchor.anchor_text_before.chars().count() <= ANCHOR_CONTEXT_CHARS);
        assert!(anchor.anchor_text_after.chars().count() <= ANCHOR_CONTEXT_CHARS);
        assert!(anchor.anchor_text_before.ends_with("Name: "));
        assert!(anchor.anchor_text_after.starts_with(" lives at"));
    }

    #[test]
    fn hash_covers_before_value_after() {
        let anchor = compute_anchor("...John Smith lives at...", "John Smith");
        assert_eq!(anchor.anchor_text_before, "...");
        assert_eq!(anchor.anchor_text_after, " lives at...");
        assert_eq!(
            anchor.anchor_hash,
            sha256_hex("...John Smith lives at...".as_bytes())
        );
    }

    #[test]
    fn context_is_capped_at_thirty_chars() {
        let page = format!("{}VALUE{}", "a".repeat(100), "b".repeat(100));
        let anchor = compute_anchor(&page, "VALUE");
        assert_eq!(anchor.anchor_text_before, "a".repeat(30));
        assert_eq!(anchor.anchor_text_after, "b".repeat(30));
    }

    #[test]
    fn context_counts_characters_not_bytes() {
        let page = format!("{}X{}", "é".repeat(40), "ü".repeat(40));
        let anchor = compute_anchor(&page, "X");
        assert_eq!(anchor.anchor_text_before.chars().count(), 30);
        assert_eq!(anchor.anchor_text_after.chars().count(), 30);
    }

    #[test]
    fn first_occurrence_wins() {
        let anchor = compute_anchor("AB ON first ... ZZ ON second", "ON");
        assert_eq!(anchor.anchor_text_before, "AB ");
    }

    #[test]
    fn absent_value_is_weak_with_bare_hash() {
        let anchor = compute_anchor("nothing relevant here", "Jane Doe");
        assert_eq!(anchor.anchor_strength, AnchorStrength::Weak);
        assert_eq!(anchor.anchor_hash, sha256_hex(b"Jane Doe"));
        assert!(anchor.anchor_text_before.is_empty());
        assert!(anchor.anchor_text_after.is_empty());
    }

    #[test]
    fn empty_value_is_none() {
        let anchor = compute_anchor("some page text", "");
        assert_eq!(anchor, Anchor::none());
        let anchor = compute_anchor("", "");
        assert_eq!(anchor.anchor_strength, AnchorStrength::None);
        assert!(anchor.anchor_hash.is_empty());
    }

    #[test]
    fn empty_page_with_value_is_weak() {
        let anchor = compute_anchor("", "120");
        assert_eq!(anchor.anchor_strength, AnchorStrength::Weak);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let a = compute_anchor("...John Smith lives at...", "John Smith");
        let b = compute_anchor("...John Smith lives at...", "John Smith");
        assert_eq!(a, b);
    }

    #[test]
    fn byte_input_replaces_invalid_sequences() {
        let page = b"Name: \xffJohn Smith";
        let anchor = compute_anchor_bytes(page, b"John Smith");
        assert_eq!(anchor.anchor_strength, AnchorStrength::Strong);
        assert_eq!(anchor.anchor_text_before, "Name: \u{FFFD}");
    }

    #[test]
    fn sha256_hex_is_lowercase_hex() {
        let h = sha256_hex(b"abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
