//! In-memory [`ObservationStore`] for tests and embedding.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. `append_run` takes the write
//! lock once, so concurrent appends to the same document cannot interleave.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IngestionRun, Observation, PageTexts};

use super::ObservationStore;

#[derive(Default)]
struct DocLog {
    runs: Option<Vec<IngestionRun>>,
    observations: Option<Vec<Observation>>,
    page_texts: Option<PageTexts>,
}

pub struct InMemoryStore {
    docs: RwLock<HashMap<String, DocLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn document_count(&self) -> usize {
        self.docs.read().unwrap().len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationStore for InMemoryStore {
    async fn load_runs(&self, doc_id: &str) -> Result<Option<Vec<IngestionRun>>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(doc_id).and_then(|d| d.runs.clone()))
    }

    async fn save_runs(&self, doc_id: &str, runs: &[IngestionRun]) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.entry(doc_id.to_string()).or_default().runs = Some(runs.to_vec());
        Ok(())
    }

    async fn load_observations(&self, doc_id: &str) -> Result<Option<Vec<Observation>>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(doc_id).and_then(|d| d.observations.clone()))
    }

    async fn save_observations(&self, doc_id: &str, observations: &[Observation]) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.entry(doc_id.to_string()).or_default().observations = Some(observations.to_vec());
        Ok(())
    }

    async fn load_page_texts(&self, doc_id: &str) -> Result<Option<PageTexts>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(doc_id).and_then(|d| d.page_texts.clone()))
    }

    async fn save_page_texts(&self, doc_id: &str, pages: &PageTexts) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.entry(doc_id.to_string()).or_default().page_texts = Some(pages.clone());
        Ok(())
    }

    async fn append_run(
        &self,
        doc_id: &str,
        run: IngestionRun,
        observations: Vec<Observation>,
    ) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        let log = docs.entry(doc_id.to_string()).or_default();
        log.runs.get_or_insert_with(Vec::new).push(run);
        log.observations
            .get_or_insert_with(Vec::new)
            .extend(observations);
        Ok(())
    }
}
