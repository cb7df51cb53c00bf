//! Core data models for observations and ingestion runs.
//!
//! These types are the persisted record shapes: every field here is written
//! to the document's observation history and read back verbatim by the
//! resolution and quality passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Normalized text of a run's pages, keyed by 1-based page number.
pub type PageTexts = BTreeMap<u32, String>;

/// How an observation's value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Extracted from page text.
    Text,
    /// Computed from document bytes or metadata, not page text.
    Derived,
    /// Synthesized by the completeness guard.
    Missing,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Text => "text",
            Method::Derived => "derived",
            Method::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Extracted,
    Missing,
}

/// Strength of the binding between a value and its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStrength {
    /// No value and no context.
    None,
    /// Value present but not found verbatim in the cited page text.
    Weak,
    /// Value found verbatim in the cited page text; the snippet is hashed.
    Strong,
}

impl AnchorStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorStrength::None => "none",
            AnchorStrength::Weak => "weak",
            AnchorStrength::Strong => "strong",
        }
    }
}

/// Provenance binding of a value to its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub anchor_text_before: String,
    pub anchor_text_after: String,
    /// Lowercase hex SHA-256 of `before + value + after`, or of the bare value.
    pub anchor_hash: String,
    pub anchor_strength: AnchorStrength,
}

impl Anchor {
    /// The empty anchor used for derived facts and missing records.
    pub fn none() -> Self {
        Self {
            anchor_text_before: String::new(),
            anchor_text_after: String::new(),
            anchor_hash: String::new(),
            anchor_strength: AnchorStrength::None,
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::none()
    }
}

/// A primitive observed value.
///
/// Variant order matters for untagged deserialization: booleans and integers
/// must be tried before floats and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for the empty string, the placeholder value of missing records.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<usize> for FieldValue {
    fn from(n: usize) -> Self {
        FieldValue::Integer(n as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// The atomic unit of extracted knowledge.
///
/// Never updated after creation; corrections are new observations appended
/// to the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub obs_id: String,
    pub doc_id: String,
    pub ingestion_run_id: String,
    pub field_key: String,
    pub entity_id: Option<String>,
    pub raw_value: FieldValue,
    pub page_number: Option<u32>,
    pub method: Method,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub anchor_violation: bool,
    pub scope: Option<String>,
    pub reason: Option<String>,
    pub anchor: Anchor,
}

impl Observation {
    /// Logical field identity used to group observations for resolution.
    pub fn group_key(&self) -> String {
        match &self.entity_id {
            Some(entity) => format!("{}.{}", entity, self.field_key),
            None => self.field_key.clone(),
        }
    }
}

/// One upload/extraction attempt for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub ingestion_run_id: String,
    pub created_at: DateTime<Utc>,
    pub source_filename: String,
    pub stored_filename: String,
    pub method: String,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_untagged_roundtrip_keeps_variants() {
        let values = vec![
            FieldValue::Bool(true),
            FieldValue::Integer(42),
            FieldValue::Float(0.25),
            FieldValue::Text("John Smith".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[true,42,0.25,"John Smith"]"#);
        let back: Vec<FieldValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Method::Derived).unwrap(), "\"derived\"");
        assert_eq!(serde_json::to_string(&Status::Missing).unwrap(), "\"missing\"");
        assert_eq!(
            serde_json::to_string(&AnchorStrength::Strong).unwrap(),
            "\"strong\""
        );
    }

    #[test]
    fn display_matches_plain_text_rendering() {
        assert_eq!(FieldValue::Integer(120).to_string(), "120");
        assert_eq!(FieldValue::Bool(false).to_string(), "false");
        assert_eq!(FieldValue::from("ON").to_string(), "ON");
    }
}
