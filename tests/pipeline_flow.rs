//! Full runs of the fetch-and-append job against an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use hr_odds_log::error::{JobError, StorageError};
use hr_odds_log::feed::types::{ApiQuota, Event, OddsSnapshot};
use hr_odds_log::feed::OddsProvider;
use hr_odds_log::invocation::guard;
use hr_odds_log::storage::{MemoryStore, ObjectStore};
use hr_odds_log::window::TimeWindow;
use hr_odds_log::{LogStore, OddsJob, OddsLog};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BUCKET: &str = "timjimmymlbdata";
const KEY: &str = "mlb_homerun_odds.json";

/// Provider that replays canned events and odds, failing on request.
#[derive(Default)]
struct ScriptedProvider {
    events: Vec<Event>,
    odds: HashMap<String, Value>,
    failing: HashMap<String, u16>,
    windows: Vec<TimeWindow>,
    odds_calls: Vec<String>,
}

impl ScriptedProvider {
    fn with_events(ids: &[&str]) -> Self {
        let events: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        Self {
            events: serde_json::from_value(Value::Array(events)).unwrap(),
            ..Default::default()
        }
    }

    fn odds_for_all(mut self, payload: Value) -> Self {
        for e in &self.events {
            self.odds.insert(e.id.clone(), payload.clone());
        }
        self
    }

    fn fail_on(mut self, id: &str, status: u16) -> Self {
        self.failing.insert(id.to_string(), status);
        self
    }
}

#[async_trait]
impl OddsProvider for ScriptedProvider {
    async fn list_events(&mut self, window: &TimeWindow) -> Result<Vec<Event>, JobError> {
        self.windows.push(*window);
        Ok(self.events.clone())
    }

    async fn event_odds(&mut self, event_id: &str) -> Result<OddsSnapshot, JobError> {
        self.odds_calls.push(event_id.to_string());
        if let Some(&status) = self.failing.get(event_id) {
            return Err(JobError::UpstreamRequest {
                endpoint: format!("/v4/sports/baseball_mlb/events/{}/odds", event_id),
                status,
                body: "{\"message\":\"boom\"}".to_string(),
            });
        }
        Ok(OddsSnapshot {
            event_id: event_id.to_string(),
            payload: self.odds.get(event_id).cloned().unwrap_or(Value::Null),
        })
    }

    fn last_quota(&self) -> Option<ApiQuota> {
        Some(ApiQuota {
            requests_used: self.odds_calls.len() as u64 + 1,
            requests_remaining: 100,
        })
    }
}

/// Store whose existence check always fails and which records any write.
#[derive(Default)]
struct UnreachableStore {
    writes: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl ObjectStore for UnreachableStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        Err(StorageError::Status {
            op: "HEAD",
            bucket: bucket.to_string(),
            key: key.to_string(),
            status: 403,
            body: String::new(),
        })
    }

    async fn download(&self, bucket: &str, key: &str, _: &Path) -> Result<(), StorageError> {
        Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn upload(&self, _: &Path, _: &str, _: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _: &str, _: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn cutoff() -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(11, 30, 0)
}

fn staging(test: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("hr-odds-log-flow-{}", std::process::id()))
        .join(format!("{}.json", test))
}

fn job(
    provider: ScriptedProvider,
    store: Arc<dyn ObjectStore>,
    test: &str,
) -> OddsJob<ScriptedProvider> {
    let log = LogStore::new(store, BUCKET, KEY, staging(test)).report_missing(true);
    OddsJob::new(provider, log).with_reset_cutoff(cutoff())
}

fn stored_log(store: &MemoryStore) -> OddsLog {
    serde_json::from_slice(&store.object(BUCKET, KEY).expect("log object")).unwrap()
}

fn seed(store: &MemoryStore, entries: usize) -> Vec<u8> {
    let entries: Vec<Value> = (0..entries)
        .map(|i| {
            json!({
                "timestamp": format!("2024-05-01T1{}:00:00.000000Z", i),
                "data": { "old": { "run": i } }
            })
        })
        .collect();
    let bytes = serde_json::to_vec(&json!({ "entries": entries })).unwrap();
    store.put_object(BUCKET, KEY, bytes.clone());
    bytes
}

#[tokio::test]
async fn test_first_run_creates_log_with_all_events() {
    let store = Arc::new(MemoryStore::new());
    let provider = ScriptedProvider::with_events(&["evt1", "evt2"]).odds_for_all(json!({"home_run": {}}));
    let mut job = job(provider, store.clone(), "first_run");

    let summary = job.run_at(at("2024-05-02T15:00:00Z")).await.unwrap();

    let log = stored_log(&store);
    assert_eq!(log.entries.len(), 1);
    let keys: Vec<&str> = log.entries[0].data.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["evt1", "evt2"]);
    assert_eq!(log.entries[0].data["evt1"], json!({"home_run": {}}));
    assert_eq!(log.entries[0].timestamp, "2024-05-02T15:00:00.000000Z");

    assert_eq!(summary.data.len(), 2);
    assert_eq!(summary.entries, 1);
    assert!(!summary.reset);
    assert_eq!(store.upload_count(), 1);
}

#[tokio::test]
async fn test_window_passed_to_provider_covers_today() {
    let store = Arc::new(MemoryStore::new());
    let mut job = job(ScriptedProvider::with_events(&[]), store.clone(), "window");

    job.run_at(at("2024-05-02T15:00:00Z")).await.unwrap();

    let windows = &job.provider().windows;
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].start, at("2024-05-02T00:00:00Z"));
    assert_eq!(windows[0].end, at("2024-05-03T02:00:00Z"));

    let log = stored_log(&store);
    assert_eq!(log.entries.len(), 1);
    assert!(log.entries[0].data.is_empty());
}

#[tokio::test]
async fn test_reset_before_cutoff_starts_fresh_log() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 3);
    let provider = ScriptedProvider::with_events(&["evt1"]).odds_for_all(json!({"home_run": {}}));
    let mut job = job(provider, store.clone(), "reset_before");

    let summary = job.run_at(at("2024-05-02T09:15:00Z")).await.unwrap();

    assert!(summary.reset);
    assert_eq!(store.delete_count(), 1);
    let log = stored_log(&store);
    assert_eq!(log.entries.len(), 1);
    assert!(log.entries[0].data.contains_key("evt1"));
    assert!(!log.entries[0].data.contains_key("old"));
}

#[tokio::test]
async fn test_before_cutoff_without_log_does_not_delete() {
    let store = Arc::new(MemoryStore::new());
    let mut job = job(ScriptedProvider::with_events(&["evt1"]), store.clone(), "reset_absent");

    let summary = job.run_at(at("2024-05-02T06:00:00Z")).await.unwrap();

    assert!(!summary.reset);
    assert_eq!(store.delete_count(), 0);
    assert_eq!(stored_log(&store).entries.len(), 1);
}

#[tokio::test]
async fn test_at_cutoff_keeps_history_and_appends() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 2);
    let provider = ScriptedProvider::with_events(&["evt9"]).odds_for_all(json!({"home_run": {"p": 1}}));
    let mut job = job(provider, store.clone(), "at_cutoff");

    let summary = job.run_at(at("2024-05-02T11:30:00Z")).await.unwrap();

    assert!(!summary.reset);
    assert_eq!(store.delete_count(), 0);
    let log = stored_log(&store);
    assert_eq!(log.entries.len(), 3);
    assert_eq!(log.entries[0].data["old"], json!({"run": 0}));
    assert_eq!(log.entries[1].data["old"], json!({"run": 1}));
    assert!(log.entries[2].data.contains_key("evt9"));
}

#[tokio::test]
async fn test_without_cutoff_never_resets() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 1);
    let log = LogStore::new(store.clone(), BUCKET, KEY, staging("no_cutoff"));
    let mut job = OddsJob::new(ScriptedProvider::with_events(&["evt1"]), log);

    job.run_at(at("2024-05-02T01:00:00Z")).await.unwrap();

    assert_eq!(store.delete_count(), 0);
    assert_eq!(stored_log(&store).entries.len(), 2);
}

#[tokio::test]
async fn test_repeated_runs_append_in_order() {
    let store = Arc::new(MemoryStore::new());
    let times = ["2024-05-02T12:00:00Z", "2024-05-02T14:00:00Z", "2024-05-02T16:00:00Z"];

    for (i, t) in times.iter().enumerate() {
        let provider = ScriptedProvider::with_events(&["evt1"]).odds_for_all(json!({ "run": i }));
        let mut job = job(provider, store.clone(), "repeated");
        let summary = job.run_at(at(t)).await.unwrap();
        assert_eq!(summary.entries, i + 1);
    }

    let log = stored_log(&store);
    assert_eq!(log.entries.len(), 3);
    for (i, entry) in log.entries.iter().enumerate() {
        assert_eq!(entry.data["evt1"], json!({ "run": i }));
    }
    assert!(log.entries[0].timestamp < log.entries[2].timestamp);
}

#[tokio::test]
async fn test_failed_odds_request_aborts_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let before = seed(&store, 2);
    let provider = ScriptedProvider::with_events(&["evt1", "evt2", "evt3"])
        .odds_for_all(json!({"home_run": {}}))
        .fail_on("evt2", 500);
    let mut job = job(provider, store.clone(), "abort");

    let err = job.run_at(at("2024-05-02T15:00:00Z")).await.unwrap_err();

    assert!(matches!(err, JobError::UpstreamRequest { status: 500, .. }));
    assert_eq!(job.provider().odds_calls, vec!["evt1", "evt2"]);
    assert_eq!(store.upload_count(), 0);
    assert_eq!(store.object(BUCKET, KEY).unwrap(), before);
}

#[tokio::test]
async fn test_failed_odds_request_before_cutoff_keeps_previous_log() {
    let store = Arc::new(MemoryStore::new());
    let before = seed(&store, 2);
    let provider = ScriptedProvider::with_events(&["evt1", "evt2"]).fail_on("evt1", 401);
    let mut job = job(provider, store.clone(), "abort_before_cutoff");

    assert!(job.run_at(at("2024-05-02T08:00:00Z")).await.is_err());

    assert_eq!(store.delete_count(), 0);
    assert_eq!(store.upload_count(), 0);
    assert_eq!(store.object(BUCKET, KEY).unwrap(), before);
}

#[tokio::test]
async fn test_corrupt_log_aborts_run() {
    let store = Arc::new(MemoryStore::new());
    store.put_object(BUCKET, KEY, b"<html>AccessDenied</html>".to_vec());
    let provider = ScriptedProvider::with_events(&["evt1"]).odds_for_all(json!({}));
    let mut job = job(provider, store.clone(), "corrupt");

    let err = job.run_at(at("2024-05-02T15:00:00Z")).await.unwrap_err();

    assert!(matches!(err, JobError::LogCorrupt { .. }));
    assert_eq!(store.upload_count(), 0);
    assert_eq!(store.object(BUCKET, KEY).unwrap(), b"<html>AccessDenied</html>".to_vec());
}

#[tokio::test]
async fn test_existence_check_failure_is_not_treated_as_absent() {
    let store = Arc::new(UnreachableStore::default());
    let provider = ScriptedProvider::with_events(&["evt1"]).odds_for_all(json!({}));
    let mut job = job(provider, store.clone(), "unreachable");

    let err = job.run_at(at("2024-05-02T15:00:00Z")).await.unwrap_err();

    assert!(matches!(err, JobError::Storage(StorageError::Status { status: 403, .. })));
    assert_eq!(store.writes.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_guard_swallows_run_errors() {
    let store = Arc::new(MemoryStore::new());
    let provider = ScriptedProvider::with_events(&["evt1"]).fail_on("evt1", 429);
    let mut job = job(provider, store.clone(), "guard");

    let outcome = guard(async {
        job.run_at(at("2024-05-02T15:00:00Z"))
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    assert!(outcome.is_none());
    assert!(store.object(BUCKET, KEY).is_none());
}
