//! Storage abstraction for document histories.
//!
//! A document's history is two append-only logs keyed by document id: its
//! ingestion runs and its observations. Next to them sits the page text of
//! the latest run, kept for previews. The [`ObservationStore`] trait keeps
//! the load/save primitives of a key-value JSON store; `None` from a load
//! means the document was never stored, which callers must keep distinct
//! from a stored-but-empty log.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::{IngestionRun, Observation, PageTexts};

/// Durable per-document store of runs and observations.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load_runs`](ObservationStore::load_runs) | Read the run log of a document |
/// | [`save_runs`](ObservationStore::save_runs) | Replace the run log |
/// | [`load_observations`](ObservationStore::load_observations) | Read the observation history |
/// | [`save_observations`](ObservationStore::save_observations) | Replace the observation history |
/// | [`load_page_texts`](ObservationStore::load_page_texts) | Read the latest run's page text |
/// | [`save_page_texts`](ObservationStore::save_page_texts) | Replace the stored page text |
/// | [`append_run`](ObservationStore::append_run) | Append one run with its observations |
#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn load_runs(&self, doc_id: &str) -> Result<Option<Vec<IngestionRun>>>;

    async fn save_runs(&self, doc_id: &str, runs: &[IngestionRun]) -> Result<()>;

    async fn load_observations(&self, doc_id: &str) -> Result<Option<Vec<Observation>>>;

    async fn save_observations(&self, doc_id: &str, observations: &[Observation]) -> Result<()>;

    async fn load_page_texts(&self, doc_id: &str) -> Result<Option<PageTexts>>;

    async fn save_page_texts(&self, doc_id: &str, pages: &PageTexts) -> Result<()>;

    /// Append a run and its observations to the document's history.
    ///
    /// Prior entries are never rewritten. Observations are saved before the
    /// run, so a run in the log always has its observations stored. The
    /// default implementation is a plain load-extend-save; backends shared
    /// between tasks override it to serialize appends per document.
    async fn append_run(
        &self,
        doc_id: &str,
        run: IngestionRun,
        observations: Vec<Observation>,
    ) -> Result<()> {
        let mut history = self.load_observations(doc_id).await?.unwrap_or_default();
        history.extend(observations);
        self.save_observations(doc_id, &history).await?;

        let mut runs = self.load_runs(doc_id).await?.unwrap_or_default();
        runs.push(run);
        self.save_runs(doc_id, &runs).await
    }
}

/// Load a document's observation history, failing with
/// [`CoreError::DocumentNotFound`] when it was never stored.
pub async fn require_observations<S: ObservationStore + ?Sized>(
    store: &S,
    doc_id: &str,
) -> Result<Vec<Observation>> {
    match store.load_observations(doc_id).await? {
        Some(history) => Ok(history),
        None => Err(CoreError::DocumentNotFound(doc_id.to_string()).into()),
    }
}
