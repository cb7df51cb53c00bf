//! Completeness guarantee for required fields.
//!
//! After all extraction attempts of a run, every required key that has no
//! `extracted` observation in the run gets an explicit `missing` observation.
//! Auditors can then tell "extraction failed" apart from "never attempted".

use std::collections::{BTreeSet, HashSet};

use crate::error::CoreError;
use crate::models::{Anchor, FieldValue, Method, Observation, Status};
use crate::observation::{ObservationDraft, ObservationFactory};

pub const MISSING_REASON: &str = "Required field not found in extracted text";

/// Append a synthetic `missing` observation for each required key absent from
/// the run's extracted observations.
///
/// Keys are emitted in lexicographic order. Returns the emitted keys. On
/// error `observations` is left untouched.
pub fn emit_missing(
    factory: &mut ObservationFactory<'_>,
    required_keys: &BTreeSet<String>,
    observations: &mut Vec<Observation>,
) -> Result<Vec<String>, CoreError> {
    let present: HashSet<&str> = observations
        .iter()
        .filter(|o| o.status == Status::Extracted)
        .map(|o| o.field_key.as_str())
        .collect();

    let missing: Vec<String> = required_keys
        .iter()
        .filter(|k| !present.contains(k.as_str()))
        .cloned()
        .collect();

    let mut records = Vec::with_capacity(missing.len());
    for key in &missing {
        let empty = FieldValue::Text(String::new());
        let draft = ObservationDraft::new(key.clone(), empty, Method::Missing, 0.0)
            .status(Status::Missing)
            .reason(MISSING_REASON)
            .anchor(Anchor::none());
        records.push(factory.build(draft)?);
    }
    observations.extend(records);

    Ok(missing)
}
