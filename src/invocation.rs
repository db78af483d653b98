//! Entry point wired to the scheduler's timer trigger.

use crate::config::{Config, StorageBackend, StorageConfig};
use crate::feed::the_odds_api::TheOddsApi;
use crate::log_store::LogStore;
use crate::pipeline::{OddsJob, RunSummary};
use crate::storage::sigv4::AwsCredentials;
use crate::storage::{LocalStore, ObjectStore, S3Store};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// What the trigger tells us about this invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub invocation_id: String,
    pub config_path: PathBuf,
    /// Which `[logs.<name>]` table to run against.
    pub log_name: String,
}

impl InvocationContext {
    pub fn new(config_path: impl Into<PathBuf>, log_name: impl Into<String>) -> Self {
        Self {
            invocation_id: format!(
                "{}-{}",
                chrono::Utc::now().format("%Y%m%dT%H%M%S"),
                std::process::id()
            ),
            config_path: config_path.into(),
            log_name: log_name.into(),
        }
    }
}

/// Run one job. Never fails: every error is logged and swallowed so the
/// scheduler always sees a clean exit.
pub async fn handle_invocation(event: serde_json::Value, ctx: InvocationContext) {
    let span = tracing::info_span!("invocation", id = %ctx.invocation_id, log = %ctx.log_name);
    async move {
        tracing::debug!(event = %event, "invocation received");
        if let Some(summary) = guard(execute(&ctx)).await {
            tracing::info!(
                events = summary.data.len(),
                entries = summary.entries,
                reset = summary.reset,
                "run complete"
            );
        }
    }
    .instrument(span)
    .await
}

/// Await `run`, logging instead of returning any error.
pub async fn guard<T, F>(run: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match run.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("run failed: {:#}", e);
            None
        }
    }
}

async fn execute(ctx: &InvocationContext) -> Result<RunSummary> {
    let config = Config::load(&ctx.config_path)?;
    let log_config = config.log(&ctx.log_name)?;

    let store = build_store(&config.storage)?;
    let staging_path = config.storage.staging_dir.join(&log_config.key);
    let log = LogStore::new(store, &config.storage.bucket, &log_config.key, staging_path)
        .report_missing(log_config.report_missing);

    let provider = TheOddsApi::new(Config::odds_api_key()?, &config.odds_api)
        .context("failed to build odds api client")?;

    let mut job = OddsJob::new(provider, log)
        .with_reset_cutoff(log_config.reset_cutoff)
        .with_quota_warning(config.odds_api.quota_warning_threshold);

    job.run()
        .await
        .with_context(|| format!("{} log run aborted", ctx.log_name))
}

pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let credentials = AwsCredentials::from_env()?;
            let store = S3Store::new(
                credentials,
                &config.region(),
                config.endpoint.as_deref(),
                Duration::from_millis(config.request_timeout_ms),
            )?;
            Ok(Arc::new(store))
        }
        StorageBackend::Local => {
            let root = config
                .local_root
                .clone()
                .context("storage.local_root is required for the local backend")?;
            Ok(Arc::new(LocalStore::new(root)))
        }
    }
}
