use crate::error::JobError;
use crate::feed::types::ApiQuota;
use crate::feed::OddsProvider;
use crate::log_store::{LogStore, RunEntry};
use crate::window::TimeWindow;
use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Event id -> raw odds payload fetched this run.
    pub data: BTreeMap<String, Value>,
    /// Whether the previous day's log was cleared first.
    pub reset: bool,
    /// Entry count of the log after the append.
    pub entries: usize,
    pub quota: Option<ApiQuota>,
}

/// True when `now` falls strictly before the daily UTC cutoff.
pub fn reset_due(now: DateTime<Utc>, cutoff: NaiveTime) -> bool {
    now.time() < cutoff
}

/// One fetch-and-append job against a single log.
///
/// A run has three phases and never retries:
/// 1. fetch: list today's events, then fetch odds for each in turn;
/// 2. reset check: before the cutoff an existing log is deleted;
/// 3. append: load (or start) the log, append one entry, save it whole.
///
/// Any error aborts the run. The stored log is not touched, reset included,
/// unless every odds request succeeded.
pub struct OddsJob<P> {
    provider: P,
    log: LogStore,
    reset_cutoff: Option<NaiveTime>,
    quota_warning_threshold: Option<u64>,
}

impl<P: OddsProvider> OddsJob<P> {
    pub fn new(provider: P, log: LogStore) -> Self {
        Self {
            provider,
            log,
            reset_cutoff: None,
            quota_warning_threshold: None,
        }
    }

    pub fn with_reset_cutoff(mut self, cutoff: Option<NaiveTime>) -> Self {
        self.reset_cutoff = cutoff;
        self
    }

    pub fn with_quota_warning(mut self, threshold: Option<u64>) -> Self {
        self.quota_warning_threshold = threshold;
        self
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn run(&mut self) -> Result<RunSummary, JobError> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<RunSummary, JobError> {
        let data = self.fetch_all(now).await?;
        let quota = self.provider.last_quota();
        self.check_quota(quota.as_ref());

        let reset = self.reset_if_due(now).await?;

        let mut log = self.log.load_or_init().await?;
        log.append(RunEntry::new(now, data.clone()));
        self.log.save(&log).await?;

        tracing::info!(
            key = %self.log.key(),
            events = data.len(),
            entries = log.len(),
            reset,
            "appended run to log"
        );

        Ok(RunSummary {
            data,
            reset,
            entries: log.len(),
            quota,
        })
    }

    /// Delete the stored log when `now` is before the cutoff and a log exists.
    pub async fn reset_if_due(&self, now: DateTime<Utc>) -> Result<bool, JobError> {
        let Some(cutoff) = self.reset_cutoff else {
            return Ok(false);
        };
        if !reset_due(now, cutoff) {
            return Ok(false);
        }
        if !self.log.exists().await? {
            return Ok(false);
        }
        self.log.reset().await?;
        tracing::info!(key = %self.log.key(), cutoff = %cutoff, "cleared previous log before daily cutoff");
        Ok(true)
    }

    /// List today's events and fetch odds for each, sequentially.
    pub async fn fetch_all(&mut self, now: DateTime<Utc>) -> Result<BTreeMap<String, Value>, JobError> {
        let window = TimeWindow::for_instant(now);
        let events = self.provider.list_events(&window).await?;
        tracing::info!(count = events.len(), from = %window.start, to = %window.end, "events in window");

        let mut data = BTreeMap::new();
        for event in &events {
            let snapshot = self.provider.event_odds(&event.id).await?;
            tracing::debug!(
                event_id = %event.id,
                home = event.home_team.as_deref().unwrap_or("?"),
                away = event.away_team.as_deref().unwrap_or("?"),
                "fetched odds"
            );
            data.insert(snapshot.event_id, snapshot.payload);
        }
        Ok(data)
    }

    fn check_quota(&self, quota: Option<&ApiQuota>) {
        let Some(quota) = quota else { return };
        tracing::debug!(
            used = quota.requests_used,
            remaining = quota.requests_remaining,
            "odds api quota"
        );
        if let Some(threshold) = self.quota_warning_threshold {
            if quota.requests_remaining < threshold {
                tracing::warn!(
                    remaining = quota.requests_remaining,
                    threshold,
                    "odds api quota running low"
                );
            }
        }
    }
}
