use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Commence-time window for "today's" slate.
///
/// Starts at midnight UTC and runs 26 hours, so games that begin after
/// midnight UTC but belong to the previous evening's slate are still included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn for_instant(now: DateTime<Utc>) -> Self {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let start = Utc.from_utc_datetime(&midnight);
        let end = start + Duration::days(1) + Duration::hours(2);
        Self { start, end }
    }

    /// `(commenceTimeFrom, commenceTimeTo)` as the provider expects them.
    pub fn query_bounds(&self) -> (String, String) {
        (
            self.start.format(QUERY_FORMAT).to_string(),
            self.end.format(QUERY_FORMAT).to_string(),
        )
    }
}
