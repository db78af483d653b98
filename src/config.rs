use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub odds_api: OddsApiConfig,
    pub storage: StorageConfig,
    pub logs: BTreeMap<String, LogConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsApiConfig {
    #[serde(default = "default_odds_base_url")]
    pub base_url: String,
    pub sport: String,
    pub regions: String,
    pub markets: String,
    pub odds_format: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Warn when the provider reports fewer remaining requests than this.
    pub quota_warning_threshold: Option<u64>,
}

fn default_odds_base_url() -> String {
    "https://api.the-odds-api.com".to_string()
}

fn default_date_format() -> String {
    "iso".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    /// Falls back to `AWS_REGION`, then `us-east-1`.
    pub region: Option<String>,
    /// S3-compatible endpoint; switches to path-style addressing.
    pub endpoint: Option<String>,
    /// Root directory for the `local` backend.
    pub local_root: Option<PathBuf>,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

impl StorageConfig {
    pub fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok().filter(|r| !r.is_empty()))
            .unwrap_or_else(|| "us-east-1".to_string())
    }
}

/// One log variant: its object key and reset policy.
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub key: String,
    /// Daily UTC cutoff ("HH:MM"); runs before it clear the previous day's log.
    #[serde(default, deserialize_with = "deserialize_cutoff")]
    pub reset_cutoff: Option<NaiveTime>,
    /// Log at info level when no prior log exists.
    #[serde(default)]
    pub report_missing: bool,
}

fn deserialize_cutoff<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_cutoff(&s).map_err(serde::de::Error::custom))
        .transpose()
}

pub fn parse_cutoff(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .map_err(|e| format!("invalid cutoff {:?} (expected HH:MM): {}", s, e))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        if config.logs.is_empty() {
            anyhow::bail!("config defines no [logs.<name>] tables");
        }
        if config.storage.backend == StorageBackend::Local && config.storage.local_root.is_none() {
            anyhow::bail!("storage.local_root is required for the local backend");
        }
        Ok(config)
    }

    pub fn log(&self, name: &str) -> Result<&LogConfig> {
        self.logs.get(name).with_context(|| {
            let known: Vec<&str> = self.logs.keys().map(String::as_str).collect();
            format!("unknown log {:?} (configured: {})", name, known.join(", "))
        })
    }

    /// Load `.env` into the process environment. Real env vars take precedence.
    pub fn load_env_file() {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to read .env"),
        }
    }

    pub fn odds_api_key() -> Result<String> {
        match std::env::var("ODDS_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => anyhow::bail!("ODDS_API_KEY is not set"),
        }
    }
}
