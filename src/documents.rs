//! Read-side views over a document's stored history.
//!
//! Used by both the `intake` CLI commands and the HTTP handlers. Every view
//! is recomputed from the full history on each call; nothing here writes.

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use credit_intake_core::entities::{summarize_entities, EntityReport};
use credit_intake_core::models::{IngestionRun, Observation};
use credit_intake_core::precedence::{NeutralPrecedence, Precedence, TransUnionPrecedence};
use credit_intake_core::quality::{assess, QualityReport};
use credit_intake_core::registry::{FieldDef, FieldRegistry};
use credit_intake_core::resolution::{resolve_with, ResolvedProfile};
use credit_intake_core::store::{require_observations, ObservationStore};
use credit_intake_core::CoreError;

use crate::config::Config;
use crate::store_fs::validate_doc_id;

#[derive(Debug, Clone, Serialize)]
pub struct ObservationsView {
    pub doc_id: String,
    pub ingestion_runs: Vec<IngestionRun>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedView {
    pub doc_id: String,
    /// `neutral` or `transunion`.
    pub precedence: &'static str,
    pub resolved: ResolvedProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityView {
    pub doc_id: String,
    #[serde(flatten)]
    pub report: QualityReport,
}

/// Page text previews are capped at this many characters.
pub const TEXT_PREVIEW_CHARS: usize = 4000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    #[error("page text not available for document: {0}")]
    Unavailable(String),

    #[error("page {page} not found in document {doc_id}")]
    PageNotFound { doc_id: String, page: u32 },
}

/// Stored page text of the latest run.
#[derive(Debug, Clone, Serialize)]
pub struct TextView {
    pub doc_id: String,
    /// The requested page, or `None` for the all-pages preview.
    pub page: Option<u32>,
    pub total_pages: usize,
    pub preview_chars: usize,
    pub text_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldsView<'r> {
    pub fields: &'r [FieldDef],
    pub required: Vec<String>,
}

pub fn fields(registry: &FieldRegistry) -> FieldsView<'_> {
    FieldsView {
        fields: registry.fields(),
        required: registry.required_keys().into_iter().collect(),
    }
}

async fn history<S: ObservationStore + ?Sized>(store: &S, doc_id: &str) -> Result<Vec<Observation>> {
    if validate_doc_id(doc_id).is_err() {
        return Err(CoreError::DocumentNotFound(doc_id.to_string()).into());
    }
    require_observations(store, doc_id).await
}

pub async fn observations<S: ObservationStore + ?Sized>(
    store: &S,
    doc_id: &str,
) -> Result<ObservationsView> {
    let observations = history(store, doc_id).await?;
    let ingestion_runs = store.load_runs(doc_id).await?.unwrap_or_default();
    Ok(ObservationsView {
        doc_id: doc_id.to_string(),
        ingestion_runs,
        observations,
    })
}

pub async fn resolved<S: ObservationStore + ?Sized>(
    config: &Config,
    store: &S,
    doc_id: &str,
) -> Result<ResolvedView> {
    let observations = history(store, doc_id).await?;

    let bureau_policy = if config.resolution.bureau_precedence {
        TransUnionPrecedence::detect(&observations)
    } else {
        None
    };
    let (precedence, policy): (&'static str, Box<dyn Precedence>) = match bureau_policy {
        Some(tu) => ("transunion", Box::new(tu)),
        None => ("neutral", Box::new(NeutralPrecedence)),
    };

    Ok(ResolvedView {
        doc_id: doc_id.to_string(),
        precedence,
        resolved: resolve_with(&observations, policy.as_ref()),
    })
}

pub async fn quality<S: ObservationStore + ?Sized>(
    config: &Config,
    registry: &FieldRegistry,
    store: &S,
    doc_id: &str,
) -> Result<QualityView> {
    let observations = history(store, doc_id).await?;
    let report = assess(
        &observations,
        &registry.required_keys(),
        config.quality.low_text_threshold,
    );
    Ok(QualityView {
        doc_id: doc_id.to_string(),
        report,
    })
}

pub async fn entities<S: ObservationStore + ?Sized>(store: &S, doc_id: &str) -> Result<EntityReport> {
    let observations = history(store, doc_id).await?;
    Ok(summarize_entities(doc_id, &observations))
}

/// Text preview of one page, or of every page with `[Page N]` headers.
pub async fn text<S: ObservationStore + ?Sized>(
    store: &S,
    doc_id: &str,
    page: Option<u32>,
) -> Result<TextView> {
    history(store, doc_id).await?;
    let pages = store
        .load_page_texts(doc_id)
        .await?
        .filter(|p| !p.is_empty())
        .ok_or_else(|| TextError::Unavailable(doc_id.to_string()))?;

    let preview: String = match page {
        Some(n) => {
            let text = pages.get(&n).ok_or_else(|| TextError::PageNotFound {
                doc_id: doc_id.to_string(),
                page: n,
            })?;
            text.chars().take(TEXT_PREVIEW_CHARS).collect()
        }
        None => {
            let mut all = String::new();
            for (n, text) in &pages {
                all.push_str(&format!("[Page {}]\n{}\n\n", n, text));
            }
            all.chars().take(TEXT_PREVIEW_CHARS).collect()
        }
    };

    Ok(TextView {
        doc_id: doc_id.to_string(),
        page,
        total_pages: pages.len(),
        preview_chars: preview.chars().count(),
        text_preview: preview,
    })
}

/// True when `err` means the document, or the requested part of it, was
/// never stored.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::DocumentNotFound(_))
    ) || err.downcast_ref::<TextError>().is_some()
}
