use serde::Deserialize;

/// the-odds-api.com v4 `/events` item. Only `id` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub commence_time: Option<String>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
}

/// One provider response for one event at one fetch time. The payload is
/// stored as received.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsSnapshot {
    pub event_id: String,
    pub payload: serde_json::Value,
}

/// API usage quota info extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiQuota {
    pub requests_used: u64,
    pub requests_remaining: u64,
}
