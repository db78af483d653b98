pub mod the_odds_api;
pub mod types;

use crate::error::JobError;
use crate::window::TimeWindow;
use async_trait::async_trait;
use types::{ApiQuota, Event, OddsSnapshot};

/// Source of today's events and their home-run market odds.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    async fn list_events(&mut self, window: &TimeWindow) -> Result<Vec<Event>, JobError>;
    async fn event_odds(&mut self, event_id: &str) -> Result<OddsSnapshot, JobError>;
    fn last_quota(&self) -> Option<ApiQuota>;
}
