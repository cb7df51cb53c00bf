//! JSON directory store.
//!
//! Layout, one directory per document under `storage.observation_dir`:
//!
//! ```text
//! <observation_dir>/<doc_id>/ingestion_runs.json
//! <observation_dir>/<doc_id>/observations.json
//! <observation_dir>/<doc_id>/page_texts.json
//! ```
//!
//! Files are pretty-printed JSON; a missing file loads as `None`. Appends
//! hold a per-document async mutex so two uploads into the same document
//! cannot interleave their load-extend-save cycles. Observations are written
//! before the run log, and are rolled back if the run log cannot be written.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use credit_intake_core::models::{IngestionRun, Observation, PageTexts};
use credit_intake_core::store::ObservationStore;

use crate::config::Config;

const RUNS_FILE: &str = "ingestion_runs.json";
const OBSERVATIONS_FILE: &str = "observations.json";
const PAGE_TEXTS_FILE: &str = "page_texts.json";

type DocLock = Arc<tokio::sync::Mutex<()>>;

pub struct JsonDirStore {
    root: PathBuf,
    append_locks: Mutex<HashMap<String, DocLock>>,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            append_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.storage.observation_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_dir(&self, doc_id: &str) -> Result<PathBuf> {
        validate_doc_id(doc_id)?;
        Ok(self.root.join(doc_id))
    }

    fn append_lock(&self, doc_id: &str) -> DocLock {
        let mut locks = self.append_locks.lock().unwrap();
        locks.entry(doc_id.to_string()).or_default().clone()
    }

    async fn read_json<T: DeserializeOwned>(&self, doc_id: &str, file: &str) -> Result<Option<T>> {
        let path = self.doc_dir(doc_id)?.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, doc_id: &str, file: &str, value: &T) -> Result<()> {
        let dir = self.doc_dir(doc_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(file);
        let tmp = dir.join(format!("{}.tmp", file));
        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Put the observation log back the way it was before a failed append.
    async fn restore_observations(&self, doc_id: &str, prior: Option<&[Observation]>) -> Result<()> {
        match prior {
            Some(history) => self.save_observations(doc_id, history).await,
            None => {
                let path = self.doc_dir(doc_id)?.join(OBSERVATIONS_FILE);
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("Failed to remove {}", path.display()))
            }
        }
    }
}

#[async_trait]
impl ObservationStore for JsonDirStore {
    async fn load_runs(&self, doc_id: &str) -> Result<Option<Vec<IngestionRun>>> {
        self.read_json(doc_id, RUNS_FILE).await
    }

    async fn save_runs(&self, doc_id: &str, runs: &[IngestionRun]) -> Result<()> {
        self.write_json(doc_id, RUNS_FILE, runs).await
    }

    async fn load_observations(&self, doc_id: &str) -> Result<Option<Vec<Observation>>> {
        self.read_json(doc_id, OBSERVATIONS_FILE).await
    }

    async fn save_observations(&self, doc_id: &str, observations: &[Observation]) -> Result<()> {
        self.write_json(doc_id, OBSERVATIONS_FILE, observations).await
    }

    async fn load_page_texts(&self, doc_id: &str) -> Result<Option<PageTexts>> {
        self.read_json(doc_id, PAGE_TEXTS_FILE).await
    }

    async fn save_page_texts(&self, doc_id: &str, pages: &PageTexts) -> Result<()> {
        self.write_json(doc_id, PAGE_TEXTS_FILE, pages).await
    }

    async fn append_run(
        &self,
        doc_id: &str,
        run: IngestionRun,
        observations: Vec<Observation>,
    ) -> Result<()> {
        let lock = self.append_lock(doc_id);
        let _guard = lock.lock().await;
        let run_id = run.ingestion_run_id.clone();
        let appended = observations.len();

        let existing = self.load_observations(doc_id).await?;
        let prior_len = existing.as_ref().map(Vec::len);
        let mut history = existing.unwrap_or_default();
        history.extend(observations);
        self.save_observations(doc_id, &history).await?;

        let mut runs = self.load_runs(doc_id).await?.unwrap_or_default();
        runs.push(run);
        if let Err(err) = self.save_runs(doc_id, &runs).await {
            let prior = prior_len.map(|n| &history[..n]);
            if let Err(rollback) = self.restore_observations(doc_id, prior).await {
                tracing::error!(
                    doc_id,
                    ingestion_run_id = %run_id,
                    error = %rollback,
                    "failed to roll back observations"
                );
            }
            return Err(err);
        }

        tracing::debug!(
            doc_id,
            ingestion_run_id = %run_id,
            appended,
            total = history.len(),
            "appended ingestion run"
        );
        Ok(())
    }
}

/// Document ids become directory names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        bail!("document id must not be empty");
    }
    if !doc_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        bail!("invalid document id: '{}'", doc_id);
    }
    Ok(())
}
