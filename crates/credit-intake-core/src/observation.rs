//! Observation construction.
//!
//! [`ObservationFactory`] is bound to one document and one ingestion run. It
//! validates field keys against the [`FieldRegistry`], assigns identifiers,
//! and stamps creation times that never go backwards within the run.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::anchor::compute_anchor;
use crate::error::CoreError;
use crate::models::{Anchor, FieldValue, Method, Observation, Status};
use crate::registry::FieldRegistry;

/// Caller-supplied parts of an observation.
#[derive(Debug, Clone)]
pub struct ObservationDraft {
    pub field_key: String,
    pub raw_value: FieldValue,
    pub method: Method,
    pub confidence: f64,
    pub status: Status,
    pub page_number: Option<u32>,
    pub entity_id: Option<String>,
    pub scope: Option<String>,
    pub reason: Option<String>,
    pub anchor: Option<Anchor>,
}

impl ObservationDraft {
    pub fn new(
        field_key: impl Into<String>,
        raw_value: impl Into<FieldValue>,
        method: Method,
        confidence: impl Into<f64>,
    ) -> Self {
        Self {
            field_key: field_key.into(),
            raw_value: raw_value.into(),
            method,
            confidence: confidence.into(),
            status: Status::Extracted,
            page_number: None,
            entity_id: None,
            scope: None,
            reason: None,
            anchor: None,
        }
    }

    pub fn page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Attach a per-page entity discriminator (`page:N`) together with the page number.
    pub fn on_page_entity(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self.entity_id = Some(format!("page:{}", page_number));
        self
    }

    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Anchor the draft's value against `page_text`.
    pub fn anchored_in(self, page_text: &str) -> Self {
        let anchor = compute_anchor(page_text, &self.raw_value.to_string());
        self.anchor(anchor)
    }
}

/// Builds observations for a single ingestion run of a single document.
pub struct ObservationFactory<'r> {
    registry: &'r FieldRegistry,
    doc_id: String,
    ingestion_run_id: String,
    last_created_at: Option<DateTime<Utc>>,
}

impl<'r> ObservationFactory<'r> {
    pub fn new(
        registry: &'r FieldRegistry,
        doc_id: impl Into<String>,
        ingestion_run_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            doc_id: doc_id.into(),
            ingestion_run_id: ingestion_run_id.into(),
            last_created_at: None,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn ingestion_run_id(&self) -> &str {
        &self.ingestion_run_id
    }

    pub fn registry(&self) -> &FieldRegistry {
        self.registry
    }

    /// Create an observation from a draft.
    ///
    /// Confidence is stored as given; out-of-range values are the caller's
    /// responsibility. NaN and infinities are rejected.
    pub fn build(&mut self, draft: ObservationDraft) -> Result<Observation, CoreError> {
        if !self.registry.contains(&draft.field_key) {
            return Err(CoreError::UnknownFieldKey(draft.field_key));
        }
        if !draft.confidence.is_finite() {
            return Err(CoreError::NonFiniteConfidence(draft.field_key));
        }

        Ok(Observation {
            obs_id: Uuid::new_v4().to_string(),
            doc_id: self.doc_id.clone(),
            ingestion_run_id: self.ingestion_run_id.clone(),
            field_key: draft.field_key,
            entity_id: draft.entity_id,
            raw_value: draft.raw_value,
            page_number: draft.page_number,
            method: draft.method,
            confidence: draft.confidence,
            created_at: self.next_timestamp(),
            status: draft.status,
            anchor_violation: false,
            scope: draft.scope,
            reason: draft.reason,
            anchor: draft.anchor.unwrap_or_else(Anchor::none),
        })
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnchorStrength;

    #[test]
    fn build_defaults_status_and_anchor() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let obs = factory
            .build(ObservationDraft::new("doc.meta.page_count", 3i64, Method::Derived, 1.0))
            .unwrap();

        assert_eq!(obs.doc_id, "doc-1");
        assert_eq!(obs.ingestion_run_id, "run-1");
        assert_eq!(obs.status, Status::Extracted);
        assert_eq!(obs.anchor, Anchor::none());
        assert!(!obs.anchor_violation);
        assert!(obs.page_number.is_none());
        assert!(Uuid::parse_str(&obs.obs_id).is_ok());
    }

    #[test]
    fn identifiers_are_unique() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let a = factory
            .build(ObservationDraft::new("report.bureau", "Unknown", Method::Derived, 0.9))
            .unwrap();
        let b = factory
            .build(ObservationDraft::new("report.bureau", "Unknown", Method::Derived, 0.9))
            .unwrap();
        assert_ne!(a.obs_id, b.obs_id);
    }

    #[test]
    fn unknown_field_key_is_rejected() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let err = factory
            .build(ObservationDraft::new("consumer.ssn", "123", Method::Text, 0.5))
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownFieldKey("consumer.ssn".to_string()));
    }

    #[test]
    fn confidence_is_not_clamped() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let high = factory
            .build(ObservationDraft::new("report.type", "x", Method::Text, 1.7))
            .unwrap();
        let low = factory
            .build(ObservationDraft::new("report.type", "x", Method::Text, -0.2f32))
            .unwrap();
        assert_eq!(high.confidence, 1.7);
        assert!((low.confidence - (-0.2f32 as f64)).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_confidence_is_rejected() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        for confidence in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = factory
                .build(ObservationDraft::new("report.type", "x", Method::Text, confidence))
                .unwrap_err();
            assert_eq!(err, CoreError::NonFiniteConfidence("report.type".to_string()));
        }
    }

    #[test]
    fn timestamps_never_decrease_within_run() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let mut previous = None;
        for _ in 0..50 {
            let obs = factory
                .build(ObservationDraft::new("report.type", "x", Method::Text, 0.5))
                .unwrap();
            if let Some(prev) = previous {
                assert!(obs.created_at >= prev);
            }
            previous = Some(obs.created_at);
        }
    }

    #[test]
    fn anchored_in_uses_rendered_value() {
        let registry = FieldRegistry::canonical();
        let mut factory = ObservationFactory::new(&registry, "doc-1", "run-1");
        let obs = factory
            .build(
                ObservationDraft::new("doc.page.text_length", 17i64, Method::Text, 1.0)
                    .on_page_entity(2)
                    .anchored_in("page of 17 chars"),
            )
            .unwrap();
        assert_eq!(obs.entity_id.as_deref(), Some("page:2"));
        assert_eq!(obs.page_number, Some(2));
        assert_eq!(obs.anchor.anchor_strength, AnchorStrength::Strong);
        assert_eq!(obs.anchor.anchor_text_before, "page of ");
    }
}
