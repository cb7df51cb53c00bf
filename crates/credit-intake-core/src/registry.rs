//! Canonical field catalogue for consumer credit reports.
//!
//! The registry is the contract for observation field keys: stable keys with
//! stable meaning. Observations can only be constructed for keys listed here,
//! and the `required` flag drives both the completeness guard at ingestion
//! time and the missing-field check at read time.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// What a field describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldScope {
    Document,
    Page,
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Int,
    Float,
    Money,
    Date,
    Bool,
    Json,
}

/// A single entry of the field catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub field_key: &'static str,
    pub label: &'static str,
    pub scope: FieldScope,
    pub entity_type: Option<&'static str>,
    pub value_type: ValueType,
    pub required: bool,
    pub description: &'static str,
    pub examples: &'static [&'static str],
}

impl FieldDef {
    const fn new(
        field_key: &'static str,
        label: &'static str,
        scope: FieldScope,
        value_type: ValueType,
    ) -> Self {
        Self {
            field_key,
            label,
            scope,
            entity_type: None,
            value_type,
            required: false,
            description: "",
            examples: &[],
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn entity(mut self, entity_type: &'static str) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    const fn describe(mut self, description: &'static str, examples: &'static [&'static str]) -> Self {
        self.description = description;
        self.examples = examples;
        self
    }
}

use FieldScope::{Document, Entity, Page};
use ValueType::{Bool, Date, Float, Int, Json, Money};

const CANONICAL_FIELDS: &[FieldDef] = &[
    // Document meta
    FieldDef::new("doc.meta.original_filename", "Original filename", Document, ValueType::String).required(),
    FieldDef::new("doc.meta.stored_filename", "Stored filename", Document, ValueType::String).required(),
    FieldDef::new("doc.meta.sha256", "SHA-256 hash", Document, ValueType::String).required(),
    FieldDef::new("doc.meta.byte_size", "File size (bytes)", Document, Int).required(),
    FieldDef::new("doc.meta.page_count", "Page count", Document, Int).required(),
    FieldDef::new("doc.meta.text_length", "Total extracted text length", Document, Int).required(),
    FieldDef::new("doc.page.text_length", "Page extracted text length", Page, Int).required(),
    // Text diagnostics
    FieldDef::new("doc.page.semantic_density", "Page letter density", Page, Float),
    FieldDef::new("doc.page.non_semantic", "Page text layer is non-semantic", Page, Bool),
    FieldDef::new("doc.page.quality_reason", "Page text quality reason", Page, ValueType::String),
    FieldDef::new("doc.text.printable_ratio", "Printable character ratio", Document, Float),
    FieldDef::new("doc.text.normalized_length", "Normalized text length", Document, Int),
    // Report identifiers
    FieldDef::new("report.bureau", "Credit bureau", Document, ValueType::String)
        .describe("TransUnion / Equifax / Unknown", &["TransUnion", "Equifax", "Unknown"]),
    FieldDef::new("report.type", "Report type", Document, ValueType::String)
        .describe("consumer disclosure / file disclosure / credit report", &["consumer disclosure"]),
    // Consumer identity
    FieldDef::new("consumer.full_name", "Consumer full name", Document, ValueType::String).required(),
    FieldDef::new("consumer.current_address.line1", "Current address line 1", Document, ValueType::String).required(),
    FieldDef::new("consumer.current_address.city", "Current address city", Document, ValueType::String).required(),
    FieldDef::new("consumer.current_address.province", "Current address province", Document, ValueType::String).required(),
    FieldDef::new("consumer.current_address.postal_code", "Current address postal code", Document, ValueType::String).required(),
    // Tradelines
    FieldDef::new("tradeline.creditor_name", "Creditor name", Entity, ValueType::String).entity("tradeline"),
    FieldDef::new("tradeline.account_type", "Account type", Entity, ValueType::String).entity("tradeline"),
    FieldDef::new("tradeline.account_status", "Account status", Entity, ValueType::String).entity("tradeline"),
    FieldDef::new("tradeline.opened_date", "Date opened", Entity, Date).entity("tradeline"),
    FieldDef::new("tradeline.reported_date", "Date reported", Entity, Date).entity("tradeline"),
    FieldDef::new("tradeline.balance", "Balance", Entity, Money).entity("tradeline"),
    FieldDef::new("tradeline.credit_limit", "Credit limit", Entity, Money).entity("tradeline"),
    FieldDef::new("tradeline.high_credit", "High credit", Entity, Money).entity("tradeline"),
    FieldDef::new("tradeline.past_due_amount", "Past due amount", Entity, Money).entity("tradeline"),
    FieldDef::new("tradeline.payment_status", "Payment status", Entity, ValueType::String).entity("tradeline"),
    FieldDef::new("tradeline.remarks", "Remarks", Entity, Json).entity("tradeline"),
    // Inquiries
    FieldDef::new("inquiry.subscriber_name", "Inquiry subscriber", Entity, ValueType::String).entity("inquiry"),
    FieldDef::new("inquiry.date", "Inquiry date", Entity, Date).entity("inquiry"),
    FieldDef::new("inquiry.type", "Inquiry type", Entity, ValueType::String)
        .entity("inquiry")
        .describe("hard/soft if detectable", &[]),
    // Collections
    FieldDef::new("collection.agency_name", "Collection agency", Entity, ValueType::String).entity("collection"),
    FieldDef::new("collection.original_creditor", "Original creditor", Entity, ValueType::String).entity("collection"),
    FieldDef::new("collection.balance", "Collection balance", Entity, Money).entity("collection"),
    FieldDef::new("collection.reported_date", "Collection reported date", Entity, Date).entity("collection"),
    FieldDef::new("collection.status", "Collection status", Entity, ValueType::String).entity("collection"),
    // Public records
    FieldDef::new("public_record.type", "Public record type", Entity, ValueType::String).entity("public_record"),
    FieldDef::new("public_record.filed_date", "Filed date", Entity, Date).entity("public_record"),
    FieldDef::new("public_record.status", "Public record status", Entity, ValueType::String).entity("public_record"),
    FieldDef::new("public_record.amount", "Public record amount", Entity, Money).entity("public_record"),
    // Alerts / statements
    FieldDef::new("fraud_alert.present", "Fraud alert present", Document, Bool),
    FieldDef::new("fraud_alert.contact_phone", "Fraud alert phone", Document, ValueType::String),
    FieldDef::new("consumer_statement.text", "Consumer statement", Document, ValueType::String),
];

/// Read-only field catalogue with key lookup.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDef>,
    index: HashMap<&'static str, usize>,
}

impl FieldRegistry {
    /// The built-in consumer credit report catalogue.
    pub fn canonical() -> Self {
        Self::from_fields(CANONICAL_FIELDS.to_vec())
    }

    pub fn from_fields(fields: Vec<FieldDef>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.field_key, i))
            .collect();
        Self { fields, index }
    }

    /// All field descriptors in catalogue order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get(&self, field_key: &str) -> Option<&FieldDef> {
        self.index.get(field_key).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, field_key: &str) -> bool {
        self.index.contains_key(field_key)
    }

    /// Keys that must always be represented by at least one observation.
    pub fn required_keys(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.field_key.to_string())
            .collect()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::canonical()
    }
}
