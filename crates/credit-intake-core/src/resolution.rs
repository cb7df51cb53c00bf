//! Deterministic resolution of conflicting observations.
//!
//! Observations are grouped by logical field identity
//! ([`Observation::group_key`]) and each group is ordered best-first:
//!
//! 1. Source precedence rank, descending (all equal unless a
//!    [`Precedence`] policy says otherwise).
//! 2. Confidence, descending.
//! 3. Creation time, descending: on a confidence tie the later observation wins.
//! 4. Original history order (the sort is stable).
//!
//! The first element wins; the rest are kept as ranked candidates. A field
//! with no observations has no entry in the result.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{FieldValue, Method, Observation, Status};
use crate::precedence::{NeutralPrecedence, Precedence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
}

/// A losing observation, reduced to what a reviewer needs to compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub observation_id: String,
    pub raw_value: FieldValue,
    pub confidence: f64,
    pub method: Method,
    pub status: Status,
}

impl From<&Observation> for Candidate {
    fn from(o: &Observation) -> Self {
        Self {
            observation_id: o.obs_id.clone(),
            raw_value: o.raw_value.clone(),
            confidence: o.confidence,
            method: o.method,
            status: o.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub resolved_value: FieldValue,
    pub resolution_status: ResolutionStatus,
    pub best_observation_id: String,
    pub candidates: Vec<Candidate>,
}

/// Resolved profile keyed by group key, in key order.
pub type ResolvedProfile = BTreeMap<String, ResolvedField>;

/// Resolve the full observation history with no source precedence.
pub fn resolve(observations: &[Observation]) -> ResolvedProfile {
    resolve_with(observations, &NeutralPrecedence)
}

/// Resolve the history, ranking sources with `precedence` before confidence.
pub fn resolve_with<P: Precedence + ?Sized>(
    observations: &[Observation],
    precedence: &P,
) -> ResolvedProfile {
    let mut groups: BTreeMap<String, Vec<&Observation>> = BTreeMap::new();
    for o in observations {
        groups.entry(o.group_key()).or_default().push(o);
    }

    groups
        .into_iter()
        .filter_map(|(key, items)| {
            let mut ranked: Vec<(u8, &Observation)> = items
                .into_iter()
                .map(|o| (precedence.rank(o), o))
                .collect();
            ranked.sort_by(|(rank_a, a), (rank_b, b)| {
                rank_b
                    .cmp(rank_a)
                    .then_with(|| compare_confidence(b.confidence, a.confidence))
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });

            let mut iter = ranked.into_iter().map(|(_, o)| o);
            let best = iter.next()?;
            let candidates = iter.map(Candidate::from).collect();

            Some((
                key,
                ResolvedField {
                    resolved_value: best.raw_value.clone(),
                    resolution_status: ResolutionStatus::Resolved,
                    best_observation_id: best.obs_id.clone(),
                    candidates,
                },
            ))
        })
        .collect()
}

/// Total order over confidences; NaN ranks below every real value.
fn compare_confidence(a: f64, b: f64) -> Ordering {
    let key = |x: f64| if x.is_nan() { f64::NEG_INFINITY } else { x };
    key(a).total_cmp(&key(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Anchor;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn obs(id: &str, key: &str, value: &str, confidence: f64, created_at: DateTime<Utc>) -> Observation {
        Observation {
            obs_id: id.to_string(),
            doc_id: "doc-1".to_string(),
            ingestion_run_id: "run-1".to_string(),
            field_key: key.to_string(),
            entity_id: None,
            raw_value: FieldValue::from(value),
            page_number: None,
            method: Method::Text,
            confidence,
            created_at,
            status: Status::Extracted,
            anchor_violation: false,
            scope: None,
            reason: None,
            anchor: Anchor::none(),
        }
    }

    #[test]
    fn higher_confidence_wins_then_later_timestamp() {
        let history = vec![
            obs("A", "consumer.full_name", "JOHN SMITH", 0.9, at(1)),
            obs("B", "consumer.full_name", "John Smith", 0.9, at(2)),
            obs("C", "consumer.full_name", "John Q Smith", 0.95, at(0)),
        ];

        let resolved = resolve(&history);
        let field = &resolved["consumer.full_name"];

        assert_eq!(field.best_observation_id, "C");
        assert_eq!(field.resolved_value, FieldValue::from("John Q Smith"));
        assert_eq!(field.resolution_status, ResolutionStatus::Resolved);
        let order: Vec<&str> = field
            .candidates
            .iter()
            .map(|c| c.observation_id.as_str())
            .collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn full_ties_keep_history_order() {
        let history = vec![
            obs("first", "report.bureau", "TransUnion", 0.9, at(5)),
            obs("second", "report.bureau", "Equifax", 0.9, at(5)),
        ];
        let resolved = resolve(&history);
        assert_eq!(resolved["report.bureau"].best_observation_id, "first");
        assert_eq!(resolved["report.bureau"].candidates[0].observation_id, "second");
    }

    #[test]
    fn entity_ids_separate_groups() {
        let mut p2 = obs("p2", "doc.page.text_length", "", 1.0, at(0));
        p2.entity_id = Some("page:2".to_string());
        p2.raw_value = FieldValue::Integer(900);
        let mut p3 = obs("p3", "doc.page.text_length", "", 1.0, at(1));
        p3.entity_id = Some("page:3".to_string());
        p3.raw_value = FieldValue::Integer(40);

        let resolved = resolve(&[p2, p3]);

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["page:2.doc.page.text_length"].best_observation_id, "p2");
        assert!(resolved["page:2.doc.page.text_length"].candidates.is_empty());
        assert_eq!(resolved["page:3.doc.page.text_length"].best_observation_id, "p3");
        assert!(!resolved.contains_key("doc.page.text_length"));
    }

    #[test]
    fn extracted_value_outranks_missing_record_across_runs() {
        let mut missing = obs("m", "consumer.full_name", "", 0.0, at(0));
        missing.method = Method::Missing;
        missing.status = Status::Missing;
        let mut found = obs("f", "consumer.full_name", "John Smith", 0.85, at(10));
        found.ingestion_run_id = "run-2".to_string();

        let resolved = resolve(&[missing, found]);
        let field = &resolved["consumer.full_name"];
        assert_eq!(field.best_observation_id, "f");
        assert_eq!(field.candidates[0].status, Status::Missing);
        assert_eq!(field.candidates[0].method, Method::Missing);
    }

    #[test]
    fn missing_only_group_still_resolves() {
        let mut missing = obs("m", "consumer.full_name", "", 0.0, at(0));
        missing.status = Status::Missing;
        missing.method = Method::Missing;
        let resolved = resolve(&[missing]);
        assert_eq!(
            resolved["consumer.full_name"].resolution_status,
            ResolutionStatus::Resolved
        );
        assert!(resolved["consumer.full_name"].resolved_value.is_empty());
    }

    #[test]
    fn empty_history_resolves_to_empty_map() {
        assert!(resolve(&[]).is_empty());
    }

    #[test]
    fn repeated_resolution_is_byte_identical() {
        let history = vec![
            obs("A", "consumer.full_name", "A", 0.5, at(1)),
            obs("B", "consumer.current_address.city", "WELLAND", 0.7, at(2)),
            obs("C", "consumer.full_name", "C", 0.5, at(1)),
        ];
        let first = serde_json::to_string(&resolve(&history)).unwrap();
        let second = serde_json::to_string(&resolve(&history)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nan_confidence_ranks_last() {
        let history = vec![
            obs("A", "report.type", "x", f64::NAN, at(1)),
            obs("B", "report.type", "y", 0.4, at(2)),
        ];
        let resolved = resolve(&history);
        assert_eq!(resolved["report.type"].best_observation_id, "B");
        assert_eq!(resolved["report.type"].candidates.len(), 1);
    }
}
