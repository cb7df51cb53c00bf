//! Advisory quality verdict over a document's observation history.
//!
//! Three signals feed the verdict: required keys that were never observed,
//! pages whose extracted text is shorter than a threshold, and anchors whose
//! strength claims provenance without a hash. Any non-empty signal turns the
//! status to `needs_review`. Nothing here fails; the report is advisory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::models::{AnchorStrength, Observation};

const PAGE_TEXT_LENGTH: &str = "doc.page.text_length";
const BUREAU: &str = "report.bureau";
const UNKNOWN_BUREAU: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Ok,
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowTextPage {
    pub page_number: Option<u32>,
    pub text_length: i64,
    pub obs_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorViolation {
    pub obs_id: String,
    pub field_key: String,
    pub page_number: Option<u32>,
    pub anchor_strength: AnchorStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub bureau: String,
    pub total_observations: usize,
    pub required_fields_total: usize,
    pub required_fields_missing: usize,
    pub missing_required_fields: Vec<String>,
    pub low_text_threshold: i64,
    pub low_text_pages: Vec<LowTextPage>,
    pub anchor_violation_count: usize,
    pub anchor_violations: Vec<AnchorViolation>,
    pub quality_status: QualityStatus,
}

/// Assess a full observation history.
///
/// A required key counts as present if it appears as a `field_key` at all,
/// including on a synthetic `missing` record: the gap is already recorded in
/// the history, so this check only catches keys nobody accounted for.
pub fn assess(
    observations: &[Observation],
    required_keys: &BTreeSet<String>,
    low_text_threshold: i64,
) -> QualityReport {
    let seen: HashSet<&str> = observations.iter().map(|o| o.field_key.as_str()).collect();
    let missing_required_fields: Vec<String> = required_keys
        .iter()
        .filter(|k| !seen.contains(k.as_str()))
        .cloned()
        .collect();

    let low_text_pages: Vec<LowTextPage> = observations
        .iter()
        .filter(|o| o.field_key == PAGE_TEXT_LENGTH)
        .filter_map(|o| {
            let text_length = o.raw_value.as_integer()?;
            (text_length < low_text_threshold).then(|| LowTextPage {
                page_number: o.page_number,
                text_length,
                obs_id: o.obs_id.clone(),
            })
        })
        .collect();

    let anchor_violations: Vec<AnchorViolation> = observations
        .iter()
        .filter(|o| has_anchor_violation(o))
        .map(|o| AnchorViolation {
            obs_id: o.obs_id.clone(),
            field_key: o.field_key.clone(),
            page_number: o.page_number,
            anchor_strength: o.anchor.anchor_strength,
        })
        .collect();

    let quality_status = if missing_required_fields.is_empty()
        && low_text_pages.is_empty()
        && anchor_violations.is_empty()
    {
        QualityStatus::Ok
    } else {
        QualityStatus::NeedsReview
    };

    QualityReport {
        bureau: detected_bureau(observations),
        total_observations: observations.len(),
        required_fields_total: required_keys.len(),
        required_fields_missing: missing_required_fields.len(),
        missing_required_fields,
        low_text_threshold,
        low_text_pages,
        anchor_violation_count: anchor_violations.len(),
        anchor_violations,
        quality_status,
    }
}

/// A weak or strong anchor must carry a hash. `none` anchors are exempt.
pub fn has_anchor_violation(o: &Observation) -> bool {
    o.anchor.anchor_strength != AnchorStrength::None && o.anchor.anchor_hash.is_empty()
}

fn detected_bureau(observations: &[Observation]) -> String {
    observations
        .iter()
        .filter(|o| o.field_key == BUREAU && !o.raw_value.is_empty())
        .map(|o| o.raw_value.to_string())
        .next()
        .unwrap_or_else(|| UNKNOWN_BUREAU.to_string())
}
