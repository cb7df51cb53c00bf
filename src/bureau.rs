//! Credit bureau detection from combined document text.

const TRANSUNION_MARKERS: &[&str] = &[
    "transunion",
    "credit report",
    "accounts summary",
    "personal information",
];

pub const TRANSUNION: &str = "TransUnion";
pub const EQUIFAX: &str = "Equifax";
pub const UNKNOWN: &str = "Unknown";

/// Confidence attached to `report.bureau` observations.
pub const BUREAU_CONFIDENCE: f64 = 0.9;

/// TransUnion markers take priority over an Equifax mention.
pub fn detect_bureau(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if TRANSUNION_MARKERS.iter().any(|m| lower.contains(m)) {
        TRANSUNION
    } else if lower.contains("equifax") {
        EQUIFAX
    } else {
        UNKNOWN
    }
}
