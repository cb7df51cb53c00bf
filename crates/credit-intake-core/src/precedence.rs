//! Source precedence policies for resolution.
//!
//! A [`Precedence`] assigns each observation a rank that is compared before
//! confidence. [`NeutralPrecedence`] ranks everything equally, which reduces
//! resolution to plain confidence/recency ordering.
//!
//! [`TransUnionPrecedence`] encodes the authoritative sections of TransUnion
//! disclosures: the `Address(es)` table outranks other address mentions, the
//! `Previous Address` section is demoted, and names from `Personal Information`
//! outrank names found elsewhere. The section is recognised from the anchor's
//! leading context.

use std::collections::BTreeSet;

use crate::models::Observation;

const ADDRESS_PREFIX: &str = "consumer.current_address.";
const FULL_NAME: &str = "consumer.full_name";
const BUREAU: &str = "report.bureau";

pub const RANK_DEMOTED: u8 = 0;
pub const RANK_NORMAL: u8 = 1;
pub const RANK_AUTHORITATIVE: u8 = 2;

pub trait Precedence {
    fn rank(&self, observation: &Observation) -> u8;
}

/// Every observation ranks equally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralPrecedence;

impl Precedence for NeutralPrecedence {
    fn rank(&self, _observation: &Observation) -> u8 {
        RANK_NORMAL
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransUnionPrecedence {
    address_table_pages: BTreeSet<u32>,
}

impl TransUnionPrecedence {
    /// Returns a policy when the history identifies the report as TransUnion.
    ///
    /// The bureau is the first `report.bureau` observation with a non-empty value.
    pub fn detect(observations: &[Observation]) -> Option<Self> {
        let bureau = observations
            .iter()
            .find(|o| o.field_key == BUREAU && !o.raw_value.is_empty())?;
        if bureau.raw_value.as_text() != Some("TransUnion") {
            return None;
        }
        Some(Self::from_history(observations))
    }

    pub fn from_history(observations: &[Observation]) -> Self {
        let address_table_pages = observations
            .iter()
            .filter(|o| o.field_key.starts_with(ADDRESS_PREFIX) && from_address_table(o))
            .filter_map(|o| o.page_number)
            .collect();
        Self { address_table_pages }
    }
}

impl Precedence for TransUnionPrecedence {
    fn rank(&self, o: &Observation) -> u8 {
        if o.field_key.starts_with(ADDRESS_PREFIX) {
            if from_previous_address(o) {
                return RANK_DEMOTED;
            }
            let on_table_page = o
                .page_number
                .map(|p| self.address_table_pages.contains(&p))
                .unwrap_or(false);
            return if on_table_page {
                RANK_AUTHORITATIVE
            } else {
                RANK_NORMAL
            };
        }
        if o.field_key == FULL_NAME && leading_context_contains(o, &["PERSONAL INFORMATION"]) {
            return RANK_AUTHORITATIVE;
        }
        RANK_NORMAL
    }
}

fn leading_context_contains(o: &Observation, needles: &[&str]) -> bool {
    let before = o.anchor.anchor_text_before.to_uppercase();
    needles.iter().any(|n| before.contains(n))
}

fn from_address_table(o: &Observation) -> bool {
    leading_context_contains(o, &["ADDRESS(ES)", "ADDRESSES:"])
}

fn from_previous_address(o: &Observation) -> bool {
    leading_context_contains(o, &["PREVIOUS ADDRESS"])
}
