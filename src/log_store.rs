//! Append-only odds log persisted as a single JSON object in object storage.
//!
//! Layout:
//!
//! ```json
//! { "entries": [ { "timestamp": "...", "data": { "<eventId>": <payload> } } ] }
//! ```
//!
//! Every run reads the whole object, appends one entry and writes the whole
//! object back. There is no concurrency token: two overlapping runs race and
//! the later upload wins, so the scheduler must never overlap invocations.

use crate::error::{JobError, StorageError};
use crate::storage::ObjectStore;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One run's snapshot of odds across all of today's events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub timestamp: String,
    pub data: BTreeMap<String, Value>,
}

impl RunEntry {
    pub fn new(taken_at: DateTime<Utc>, data: BTreeMap<String, Value>) -> Self {
        Self {
            timestamp: taken_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsLog {
    pub entries: Vec<RunEntry>,
    /// Top-level fields written by other tools, kept so a re-save is lossless.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OddsLog {
    pub fn append(&mut self, entry: RunEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and writes one log object (fixed bucket and key), staging the
/// content through a local file.
pub struct LogStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    staging_path: PathBuf,
    report_missing: bool,
}

impl LogStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        staging_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
            staging_path: staging_path.into(),
            report_missing: false,
        }
    }

    /// Log at info level when a run finds no existing log.
    pub fn report_missing(mut self, report: bool) -> Self {
        self.report_missing = report;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Backend failures are returned as errors, never reported as absence.
    pub async fn exists(&self) -> Result<bool, StorageError> {
        self.store.exists(&self.bucket, &self.key).await
    }

    pub async fn load(&self) -> Result<OddsLog, JobError> {
        self.prepare_staging().await?;
        self.store
            .download(&self.bucket, &self.key, &self.staging_path)
            .await?;
        let bytes = tokio::fs::read(&self.staging_path)
            .await
            .map_err(|e| StorageError::io(&self.staging_path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| JobError::LogCorrupt {
            key: self.key.clone(),
            source,
        })
    }

    /// Load the log, or start an empty one when no object exists yet.
    pub async fn load_or_init(&self) -> Result<OddsLog, JobError> {
        if self.exists().await? {
            return self.load().await;
        }
        if self.report_missing {
            tracing::info!(bucket = %self.bucket, key = %self.key, "no existing log, starting a new one");
        } else {
            tracing::debug!(key = %self.key, "no existing log");
        }
        Ok(OddsLog::default())
    }

    /// Full-object replace of the stored log.
    pub async fn save(&self, log: &OddsLog) -> Result<(), JobError> {
        self.prepare_staging().await?;
        let bytes = serde_json::to_vec(log)
            .map_err(|e| StorageError::io(&self.staging_path, e.into()))?;
        tokio::fs::write(&self.staging_path, &bytes)
            .await
            .map_err(|e| StorageError::io(&self.staging_path, e))?;
        self.store
            .upload(&self.staging_path, &self.bucket, &self.key)
            .await?;
        tracing::debug!(key = %self.key, entries = log.len(), bytes = bytes.len(), "saved log");
        Ok(())
    }

    pub async fn reset(&self) -> Result<(), StorageError> {
        self.store.delete(&self.bucket, &self.key).await
    }

    async fn prepare_staging(&self) -> Result<(), StorageError> {
        match self.staging_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e)),
            _ => Ok(()),
        }
    }
}
