//! FDSN event query construction.

use chrono::{DateTime, Duration, Utc};
use quake_watch_config::FeedDialect;

/// Timestamp layout for `starttime`/`endtime`: second precision, no zone
/// suffix.
pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The time window and magnitude floor of one feed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    /// Inclusive window start.
    pub start: DateTime<Utc>,
    /// Window end. `None` lets the provider default to "now".
    pub end: Option<DateTime<Utc>>,
    /// Events below this magnitude are not returned by the provider.
    pub min_magnitude: f64,
}

impl QueryWindow {
    /// Builds the window `[now - period, now]`, sending `endtime` only
    /// when `include_end` is set. A period reaching before the earliest
    /// representable instant starts the window there.
    #[must_use]
    pub fn ending_at(
        now: DateTime<Utc>,
        period: Duration,
        include_end: bool,
        min_magnitude: f64,
    ) -> Self {
        Self {
            start: now
                .checked_sub_signed(period)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: include_end.then_some(now),
            min_magnitude,
        }
    }
}

/// Builds the query URL for `window` against `base_url`.
///
/// The provider returns every event above the floor worldwide; distance
/// filtering happens after parsing.
#[must_use]
pub fn build_query_url(base_url: &str, dialect: FeedDialect, window: &QueryWindow) -> String {
    let format = dialect.format_param();
    let min_magnitude = window.min_magnitude;
    let start = window.start.format(QUERY_TIME_FORMAT);
    let sep = if base_url.contains('?') { '&' } else { '?' };

    let mut url =
        format!("{base_url}{sep}format={format}&minmag={min_magnitude}&starttime={start}");
    if let Some(end) = window.end {
        url.push_str(&format!("&endtime={}", end.format(QUERY_TIME_FORMAT)));
    }
    url
}
