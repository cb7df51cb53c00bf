//! Summary of entity-scoped observations.
//!
//! Entities are whatever carries an `entity_id`: per-page diagnostics
//! (`page:N`) and inquiry blocks (`inquiry:P:B`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::Observation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    /// Field-key prefix of the first observation seen for this entity.
    pub entity_type: String,
    pub field_count: usize,
    pub fields: Vec<String>,
    pub page_numbers: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    pub doc_id: String,
    pub entity_count: usize,
    pub entity_counts: BTreeMap<String, usize>,
    pub entities: BTreeMap<String, EntitySummary>,
}

#[derive(Default)]
struct Accumulator {
    entity_type: String,
    field_count: usize,
    fields: BTreeSet<String>,
    pages: BTreeSet<u32>,
}

pub fn summarize_entities(doc_id: &str, observations: &[Observation]) -> EntityReport {
    let mut acc: BTreeMap<String, Accumulator> = BTreeMap::new();

    for o in observations {
        let Some(entity_id) = o.entity_id.as_deref() else {
            continue;
        };
        let entry = acc.entry(entity_id.to_string()).or_insert_with(|| Accumulator {
            entity_type: entity_type_of(&o.field_key).to_string(),
            ..Default::default()
        });
        entry.field_count += 1;
        entry.fields.insert(o.field_key.clone());
        if let Some(p) = o.page_number {
            entry.pages.insert(p);
        }
    }

    let mut entity_counts: BTreeMap<String, usize> = BTreeMap::new();
    let entities: BTreeMap<String, EntitySummary> = acc
        .into_iter()
        .map(|(entity_id, a)| {
            *entity_counts.entry(a.entity_type.clone()).or_default() += 1;
            let summary = EntitySummary {
                entity_id: entity_id.clone(),
                entity_type: a.entity_type,
                field_count: a.field_count,
                fields: a.fields.into_iter().collect(),
                page_numbers: a.pages.into_iter().collect(),
            };
            (entity_id, summary)
        })
        .collect();

    EntityReport {
        doc_id: doc_id.to_string(),
        entity_count: entities.len(),
        entity_counts,
        entities,
    }
}

fn entity_type_of(field_key: &str) -> &str {
    match field_key.split_once('.') {
        Some((prefix, _)) => prefix,
        None => "unknown",
    }
}
