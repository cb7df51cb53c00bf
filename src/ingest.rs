//! Ingestion pipeline orchestration.
//!
//! Coordinates one upload: validation → page extraction → observation
//! building → completeness guard → file storage → history append → page text
//! save. Observation building is split out into [`observe_pages`] so it can
//! run without a PDF or a store. The stored upload is removed again when the
//! history append fails.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use credit_intake_core::anchor::sha256_hex;
use credit_intake_core::completeness::emit_missing;
use credit_intake_core::error::CoreError;
use credit_intake_core::models::{FieldValue, IngestionRun, Method, Observation, PageTexts};
use credit_intake_core::observation::{ObservationDraft, ObservationFactory};
use credit_intake_core::registry::FieldRegistry;
use credit_intake_core::store::ObservationStore;

use crate::bureau::{detect_bureau, BUREAU_CONFIDENCE};
use crate::config::Config;
use crate::extract::{self, assess_semantic_quality, printable_ratio, round4, ExtractedPages};
use crate::identity::extract_identity;
use crate::inquiry::extract_inquiries;
use crate::store_fs::validate_doc_id;

/// Label recorded on every ingestion run produced by this pipeline.
pub const RUN_METHOD: &str = "pdf_text";

const NAME_CONFIDENCE: f64 = 0.85;
const LINE1_CONFIDENCE: f64 = 0.80;
const CITY_CONFIDENCE: f64 = 0.70;
const PROVINCE_CONFIDENCE: f64 = 0.90;
const POSTAL_CONFIDENCE: f64 = 0.95;
const INQUIRY_CONFIDENCE: f64 = 0.70;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Only PDF files are supported: '{0}'")]
    NotPdf(String),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid document id: '{0}'")]
    InvalidDocId(String),

    #[error("Document not found: {0}")]
    UnknownDocument(String),

    #[error("Unreadable PDF: {0}")]
    Unreadable(#[from] extract::ExtractError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One upload.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Re-ingest into an existing document instead of creating a new one.
    pub doc_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestReceipt {
    pub doc_id: String,
    pub filename: String,
    pub stored_as: String,
    pub sha256: String,
    pub ingestion_run_id: String,
}

/// Byte-level facts about the uploaded file.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub original_filename: String,
    pub stored_filename: String,
    pub sha256: String,
    pub byte_size: usize,
}

/// Observations for one run, completeness-guarded.
#[derive(Debug, Clone)]
pub struct RunObservations {
    pub observations: Vec<Observation>,
    pub missing_keys: Vec<String>,
}

pub async fn ingest_document<S: ObservationStore + ?Sized>(
    config: &Config,
    registry: &FieldRegistry,
    store: &S,
    request: IngestRequest,
) -> Result<IngestReceipt, IngestError> {
    let IngestRequest {
        filename,
        bytes,
        doc_id,
    } = request;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(IngestError::NotPdf(filename));
    }
    let limit = config.extraction.max_upload_bytes;
    if bytes.len() > limit {
        return Err(IngestError::TooLarge {
            size: bytes.len(),
            limit,
        });
    }

    let ingestion_run_id = Uuid::new_v4().to_string();
    let (doc_id, stored_filename) = match doc_id {
        Some(existing) => {
            validate_doc_id(&existing).map_err(|_| IngestError::InvalidDocId(existing.clone()))?;
            if store.load_observations(&existing).await?.is_none() {
                return Err(IngestError::UnknownDocument(existing));
            }
            let stored = format!("{}-{}.pdf", existing, ingestion_run_id);
            (existing, stored)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            let stored = format!("{}.pdf", id);
            (id, stored)
        }
    };

    let (bytes, extracted) = tokio::task::spawn_blocking(move || {
        let result = extract::extract_pages(&bytes);
        (bytes, result)
    })
    .await
    .map_err(|e| extract::ExtractError::Pdf(format!("extractor aborted: {}", e)))?;
    let pages = extracted?;

    let meta = SourceMeta {
        original_filename: filename.clone(),
        stored_filename: stored_filename.clone(),
        sha256: sha256_hex(&bytes),
        byte_size: bytes.len(),
    };

    let RunObservations {
        observations,
        missing_keys,
    } = observe_pages(registry, &doc_id, &ingestion_run_id, &meta, &pages)?;

    let low_text_pages: Vec<usize> = pages
        .pages
        .iter()
        .enumerate()
        .filter(|(_, t)| (t.chars().count() as i64) < config.quality.low_text_threshold)
        .map(|(i, _)| i + 1)
        .collect();

    let run = IngestionRun {
        ingestion_run_id: ingestion_run_id.clone(),
        created_at: Utc::now(),
        source_filename: filename.clone(),
        stored_filename: stored_filename.clone(),
        method: RUN_METHOD.to_string(),
        notes: run_notes(pages.page_count(), &low_text_pages, &missing_keys),
    };

    let upload_path = store_upload(&config.storage.upload_dir, &stored_filename, &bytes).await?;

    let observation_count = observations.len();
    if let Err(err) = store.append_run(&doc_id, run, observations).await {
        if let Err(cleanup) = tokio::fs::remove_file(&upload_path).await {
            tracing::warn!(
                path = %upload_path.display(),
                error = %cleanup,
                "failed to remove orphaned upload"
            );
        }
        return Err(err.into());
    }

    if let Err(err) = store.save_page_texts(&doc_id, &page_texts(&pages)).await {
        tracing::warn!(doc_id = %doc_id, error = %err, "failed to save page text preview");
    }

    tracing::info!(
        doc_id = %doc_id,
        ingestion_run_id = %ingestion_run_id,
        pages = pages.page_count(),
        observations = observation_count,
        missing = missing_keys.len(),
        "ingested document"
    );
    if !missing_keys.is_empty() {
        tracing::warn!(doc_id = %doc_id, missing = ?missing_keys, "required fields not found");
    }

    Ok(IngestReceipt {
        doc_id,
        filename,
        stored_as: stored_filename,
        sha256: meta.sha256,
        ingestion_run_id,
    })
}

async fn store_upload(upload_dir: &Path, stored_filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    tokio::fs::create_dir_all(upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", upload_dir.display()))?;
    let path = upload_dir.join(stored_filename);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn page_texts(pages: &ExtractedPages) -> PageTexts {
    pages
        .pages
        .iter()
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, text.clone()))
        .collect()
}

fn run_notes(page_count: usize, low_text_pages: &[usize], missing_keys: &[String]) -> String {
    let mut notes = format!("pages={}", page_count);
    if !low_text_pages.is_empty() {
        let list: Vec<String> = low_text_pages.iter().map(|p| p.to_string()).collect();
        notes.push_str(&format!("; low_text_pages={}", list.join(",")));
    }
    if !missing_keys.is_empty() {
        notes.push_str(&format!("; missing={}", missing_keys.join(",")));
    }
    notes
}

/// Build every observation for one run of one document.
///
/// Emits document meta facts, per-page diagnostics and text lengths, then
/// the detected bureau, the parsed identity and one entity per inquiry
/// block. Finally appends `missing` records for every required key the run
/// did not extract.
pub fn observe_pages(
    registry: &FieldRegistry,
    doc_id: &str,
    ingestion_run_id: &str,
    meta: &SourceMeta,
    pages: &ExtractedPages,
) -> Result<RunObservations, CoreError> {
    let mut factory = ObservationFactory::new(registry, doc_id, ingestion_run_id);
    let mut out: Vec<Observation> = Vec::new();

    let derived =
        |key: &str, value: FieldValue| ObservationDraft::new(key, value, Method::Derived, 1.0);

    let document_facts: [(&str, FieldValue); 5] = [
        ("doc.meta.original_filename", meta.original_filename.as_str().into()),
        ("doc.meta.stored_filename", meta.stored_filename.as_str().into()),
        ("doc.meta.sha256", meta.sha256.as_str().into()),
        ("doc.meta.byte_size", meta.byte_size.into()),
        ("doc.meta.page_count", pages.page_count().into()),
    ];
    for (key, value) in document_facts {
        out.push(factory.build(derived(key, value))?);
    }

    for (i, text) in pages.pages.iter().enumerate() {
        let page = i as u32 + 1;
        let quality = assess_semantic_quality(text);
        let diagnostics: [(&str, FieldValue); 3] = [
            ("doc.page.semantic_density", quality.density.into()),
            ("doc.page.non_semantic", quality.non_semantic.into()),
            ("doc.page.quality_reason", quality.reason.into()),
        ];
        for (key, value) in diagnostics {
            out.push(factory.build(derived(key, value).on_page_entity(page))?);
        }
    }

    let combined = pages.combined();
    let total_length = combined.chars().count();
    out.push(factory.build(ObservationDraft::new(
        "doc.meta.text_length",
        total_length,
        Method::Text,
        1.0,
    ))?);

    for (i, text) in pages.pages.iter().enumerate() {
        let page = i as u32 + 1;
        let length = text.chars().count();
        let draft = ObservationDraft::new("doc.page.text_length", length, Method::Text, 1.0)
            .on_page_entity(page)
            .anchored_in(text);
        out.push(factory.build(draft)?);
    }

    let ratio = round4(printable_ratio(&combined));
    out.push(factory.build(derived("doc.text.printable_ratio", ratio.into()))?);
    out.push(factory.build(derived("doc.text.normalized_length", total_length.into()))?);

    let bureau = detect_bureau(&combined);
    out.push(factory.build(ObservationDraft::new(
        "report.bureau",
        bureau,
        Method::Derived,
        BUREAU_CONFIDENCE,
    ))?);

    let identity = extract_identity(&pages.pages);
    if let (Some(name), Some(page)) = (identity.full_name.as_deref(), identity.name_page) {
        let draft = ObservationDraft::new("consumer.full_name", name, Method::Text, NAME_CONFIDENCE)
            .page(page)
            .anchored_in(pages.page(page));
        out.push(factory.build(draft)?);
    }

    if let Some(page) = identity.address_page {
        let page_text = pages.page(page);
        let addr = &identity.current_address;
        let fields = [
            ("consumer.current_address.line1", &addr.line1, LINE1_CONFIDENCE),
            ("consumer.current_address.city", &addr.city, CITY_CONFIDENCE),
            ("consumer.current_address.province", &addr.province, PROVINCE_CONFIDENCE),
            ("consumer.current_address.postal_code", &addr.postal_code, POSTAL_CONFIDENCE),
        ];
        for (key, value, confidence) in fields {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let draft = ObservationDraft::new(key, value, Method::Text, confidence)
                .page(page)
                .anchored_in(page_text);
            out.push(factory.build(draft)?);
        }
    }

    for inquiry in extract_inquiries(&pages.pages) {
        let page_text = pages.page(inquiry.page);
        let entity_id = inquiry.entity_id();
        let values = [
            Some(("inquiry.date", inquiry.date)),
            inquiry.subscriber.map(|s| ("inquiry.subscriber_name", s)),
        ];
        for (key, value) in values.into_iter().flatten() {
            let draft = ObservationDraft::new(key, value, Method::Text, INQUIRY_CONFIDENCE)
                .page(inquiry.page)
                .entity(entity_id.as_str())
                .anchored_in(page_text);
            out.push(factory.build(draft)?);
        }
    }

    let missing_keys = emit_missing(&mut factory, &registry.required_keys(), &mut out)?;

    Ok(RunObservations {
        observations: out,
        missing_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_intake_core::models::{AnchorStrength, Status};
    use credit_intake_core::store::memory::InMemoryStore;

    fn meta() -> SourceMeta {
        SourceMeta {
            original_filename: "report.pdf".to_string(),
            stored_filename: "doc-1.pdf".to_string(),
            sha256: sha256_hex(b"%PDF"),
            byte_size: 4,
        }
    }

    fn find<'a>(obs: &'a [Observation], key: &str) -> Vec<&'a Observation> {
        obs.iter().filter(|o| o.field_key == key).collect()
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::minimal();
        config.storage.upload_dir = dir.join("uploads");
        config.storage.observation_dir = dir.join("observations");
        config
    }

    #[test]
    fn identity_page_yields_anchored_identity_and_no_missing() {
        let registry = FieldRegistry::canonical();
        let page1 = "TransUnion Consumer Disclosure\nName: John Smith\nCurrent Address\n26 MAIN ST E\nSTEWIACKE NS B0N 2H0";
        let pages = ExtractedPages::from_pages(vec![page1.to_string()]);

        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();

        assert!(run.missing_keys.is_empty());
        let name = find(&run.observations, "consumer.full_name");
        assert_eq!(name.len(), 1);
        assert_eq!(name[0].raw_value, FieldValue::from("John Smith"));
        assert_eq!(name[0].page_number, Some(1));
        assert_eq!(name[0].confidence, 0.85);
        assert_eq!(name[0].anchor.anchor_strength, AnchorStrength::Strong);

        let postal = find(&run.observations, "consumer.current_address.postal_code");
        assert_eq!(postal[0].raw_value, FieldValue::from("B0N 2H0"));
        assert_eq!(postal[0].anchor.anchor_strength, AnchorStrength::Strong);

        let bureau = find(&run.observations, "report.bureau");
        assert_eq!(bureau[0].raw_value, FieldValue::from("TransUnion"));
        assert_eq!(bureau[0].method, Method::Derived);
    }

    #[test]
    fn nbsp_in_name_line_keeps_strong_anchor() {
        let registry = FieldRegistry::canonical();
        let raw = "TransUnion Consumer Disclosure\nName:\u{00A0}John\u{00A0}Smith\n";
        let pages = ExtractedPages::from_pages(vec![extract::normalize_text(raw)]);

        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();

        let name = find(&run.observations, "consumer.full_name");
        assert_eq!(name[0].raw_value, FieldValue::from("John Smith"));
        assert_eq!(name[0].anchor.anchor_strength, AnchorStrength::Strong);
        assert!(!name[0].anchor_violation);
    }

    #[test]
    fn inquiry_blocks_become_anchored_entities() {
        let registry = FieldRegistry::canonical();
        let page2 = "Inquiries\n2024-01-15 Subscriber: ROYAL BANK\n2023-11-30\nBMO MASTERCARD";
        let pages = ExtractedPages::from_pages(vec!["cover".to_string(), page2.to_string()]);

        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();

        let dates = find(&run.observations, "inquiry.date");
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].entity_id.as_deref(), Some("inquiry:2:0"));
        assert_eq!(dates[0].raw_value, FieldValue::from("2024-01-15"));
        assert_eq!(dates[0].page_number, Some(2));
        assert_eq!(dates[0].confidence, 0.7);
        assert_eq!(dates[0].anchor.anchor_strength, AnchorStrength::Strong);

        let subscribers = find(&run.observations, "inquiry.subscriber_name");
        assert_eq!(subscribers.len(), 2);
        assert_eq!(subscribers[0].raw_value, FieldValue::from("ROYAL BANK"));
        assert_eq!(subscribers[1].raw_value, FieldValue::from("BMO MASTERCARD"));
        assert_eq!(subscribers[1].entity_id.as_deref(), Some("inquiry:2:1"));
        assert_eq!(subscribers[1].method, Method::Text);
    }

    #[test]
    fn page_texts_are_keyed_from_one() {
        let pages = ExtractedPages::from_pages(vec!["a".to_string(), "b".to_string()]);
        let texts = page_texts(&pages);
        assert_eq!(texts.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(texts[&2], "b");
    }

    #[test]
    fn blank_document_emits_missing_identity_records() {
        let registry = FieldRegistry::canonical();
        let pages = ExtractedPages::from_pages(vec![String::new()]);

        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();

        assert_eq!(
            run.missing_keys,
            vec![
                "consumer.current_address.city",
                "consumer.current_address.line1",
                "consumer.current_address.postal_code",
                "consumer.current_address.province",
                "consumer.full_name",
            ]
        );
        let missing: Vec<&Observation> = run
            .observations
            .iter()
            .filter(|o| o.status == Status::Missing)
            .collect();
        assert_eq!(missing.len(), 5);
        assert!(missing.iter().all(|o| o.method == Method::Missing && o.confidence == 0.0));

        let density = find(&run.observations, "doc.page.quality_reason");
        assert_eq!(density[0].raw_value, FieldValue::from("empty_text"));
        assert_eq!(density[0].entity_id.as_deref(), Some("page:1"));
    }

    #[test]
    fn page_diagnostics_are_per_page_entities() {
        let registry = FieldRegistry::canonical();
        let pages = ExtractedPages::from_pages(vec![
            "This is the first page of the file.".to_string(),
            "short".to_string(),
        ]);
        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();

        let lengths = find(&run.observations, "doc.page.text_length");
        assert_eq!(lengths.len(), 2);
        assert_eq!(lengths[0].entity_id.as_deref(), Some("page:1"));
        assert_eq!(lengths[1].raw_value, FieldValue::Integer(5));
        assert_eq!(lengths[1].page_number, Some(2));

        let total = find(&run.observations, "doc.meta.text_length");
        assert_eq!(total[0].raw_value, FieldValue::Integer(35 + 1 + 5));
        assert_eq!(total[0].method, Method::Text);

        let count = find(&run.observations, "doc.meta.page_count");
        assert_eq!(count[0].raw_value, FieldValue::Integer(2));
    }

    #[test]
    fn zero_page_document_is_guarded_for_page_length() {
        let registry = FieldRegistry::canonical();
        let pages = ExtractedPages::from_pages(Vec::new());
        let run = observe_pages(&registry, "doc-1", "run-1", &meta(), &pages).unwrap();
        assert!(run.missing_keys.contains(&"doc.page.text_length".to_string()));
    }

    #[test]
    fn notes_summarise_run() {
        assert_eq!(run_notes(3, &[], &[]), "pages=3");
        assert_eq!(
            run_notes(2, &[2], &["consumer.full_name".to_string()]),
            "pages=2; low_text_pages=2; missing=consumer.full_name"
        );
    }

    #[tokio::test]
    async fn non_pdf_filename_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = InMemoryStore::new();
        let err = ingest_document(
            &config,
            &FieldRegistry::canonical(),
            &store,
            IngestRequest {
                filename: "report.txt".to_string(),
                bytes: b"hello".to_vec(),
                doc_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::NotPdf(_)));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.extraction.max_upload_bytes = 4;
        let store = InMemoryStore::new();
        let err = ingest_document(
            &config,
            &FieldRegistry::canonical(),
            &store,
            IngestRequest {
                filename: "report.pdf".to_string(),
                bytes: vec![0u8; 5],
                doc_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { size: 5, limit: 4 }));
    }

    #[tokio::test]
    async fn reingest_into_unknown_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = InMemoryStore::new();
        let err = ingest_document(
            &config,
            &FieldRegistry::canonical(),
            &store,
            IngestRequest {
                filename: "report.pdf".to_string(),
                bytes: b"%PDF-1.4".to_vec(),
                doc_id: Some("does-not-exist".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::UnknownDocument(_)));
    }

    #[tokio::test]
    async fn unreadable_pdf_is_rejected_before_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = InMemoryStore::new();
        let err = ingest_document(
            &config,
            &FieldRegistry::canonical(),
            &store,
            IngestRequest {
                filename: "report.pdf".to_string(),
                bytes: b"not a pdf".to_vec(),
                doc_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::Unreadable(_)));
        assert_eq!(store.document_count(), 0);
        assert!(!config.storage.upload_dir.exists());
    }
}
