use super::types::*;
use super::OddsProvider;
use crate::config::OddsApiConfig;
use crate::error::JobError;
use crate::window::TimeWindow;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::time::Duration;

/// the-odds-api.com v4 client for the event list and per-event odds.
pub struct TheOddsApi {
    client: Client,
    api_key: String,
    base_url: String,
    sport: String,
    regions: String,
    markets: String,
    odds_format: String,
    date_format: String,
    last_quota: Option<ApiQuota>,
}

/// Parse a quota header that may be an integer or float (e.g. "14527.0").
fn parse_quota_header(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as u64)
}

/// Quota from response headers, or `None` when the remaining count is absent.
fn quota_from_headers(headers: &reqwest::header::HeaderMap) -> Option<ApiQuota> {
    let requests_remaining = parse_quota_header(headers, "x-requests-remaining")?;
    Some(ApiQuota {
        requests_used: parse_quota_header(headers, "x-requests-used").unwrap_or(0),
        requests_remaining,
    })
}

/// reqwest renders the request url into its errors, and ours carries the key.
fn redacted(e: reqwest::Error) -> JobError {
    JobError::Http(e.without_url())
}

impl TheOddsApi {
    pub fn new(api_key: String, config: &OddsApiConfig) -> Result<Self, JobError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sport: config.sport.clone(),
            regions: config.regions.clone(),
            markets: config.markets.clone(),
            odds_format: config.odds_format.clone(),
            date_format: config.date_format.clone(),
            last_quota: None,
        })
    }

    pub fn events_url(&self, window: &TimeWindow) -> Result<Url, JobError> {
        let (from, to) = window.query_bounds();
        self.endpoint_url(
            &["events"],
            &[
                ("commenceTimeFrom", from.as_str()),
                ("commenceTimeTo", to.as_str()),
                ("dateFormat", "iso"),
            ],
        )
    }

    pub fn event_odds_url(&self, event_id: &str) -> Result<Url, JobError> {
        self.endpoint_url(
            &["events", event_id, "odds"],
            &[
                ("regions", self.regions.as_str()),
                ("markets", self.markets.as_str()),
                ("oddsFormat", self.odds_format.as_str()),
                ("dateFormat", self.date_format.as_str()),
            ],
        )
    }

    /// `{base}/v4/sports/{sport}/{segments..}?apiKey=..&{params..}`. Each
    /// segment is percent-encoded, so ids cannot alter the path or query.
    fn endpoint_url(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url, JobError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| JobError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| JobError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "sports", self.sport.as_str()])
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("apiKey", &self.api_key)
            .extend_pairs(params);
        Ok(url)
    }

    /// Send a GET, record quota headers, and fail on any non-success status.
    async fn get(&mut self, url: Url) -> Result<Response, JobError> {
        let endpoint = url.path().to_string();
        let resp = self.client.get(url).send().await.map_err(redacted)?;

        if let Some(quota) = quota_from_headers(resp.headers()) {
            self.last_quota = Some(quota);
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JobError::UpstreamRequest {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl OddsProvider for TheOddsApi {
    async fn list_events(&mut self, window: &TimeWindow) -> Result<Vec<Event>, JobError> {
        let url = self.events_url(window)?;
        let resp = self.get(url).await?;
        let events: Vec<Event> = resp.json().await.map_err(redacted)?;
        tracing::debug!(sport = %self.sport, count = events.len(), "listed events");
        Ok(events)
    }

    async fn event_odds(&mut self, event_id: &str) -> Result<OddsSnapshot, JobError> {
        let url = self.event_odds_url(event_id)?;
        let resp = self.get(url).await?;
        let payload: serde_json::Value = resp.json().await.map_err(redacted)?;
        Ok(OddsSnapshot {
            event_id: event_id.to_string(),
            payload,
        })
    }

    fn last_quota(&self) -> Option<ApiQuota> {
        self.last_quota.clone()
    }
}
