//! Message templates for every state the monitor can show.

use chrono::{DateTime, NaiveDateTime, Utc};
use quake_watch_config::Config;
use quake_watch_event_models::{Earthquake, MessageClass};

use crate::collaborators::{Message, local_time};

/// Placeholder for a missing event time.
const NO_TIME: &str = "--:--";

/// Cuts `text` to `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Formats a local timestamp as `HH:MM`.
#[must_use]
pub fn format_clock(local: NaiveDateTime) -> String {
    local.format("%H:%M").to_string()
}

/// Event time as local `HH:MM`, or the raw upstream text when it did not
/// parse.
#[must_use]
pub fn format_event_time(quake: &Earthquake, utc_offset_hours: i32) -> String {
    match quake.time {
        Some(time) => format_clock(local_time(time, utc_offset_hours)),
        None if quake.raw_time.is_empty() => NO_TIME.to_string(),
        None => quake.raw_time.clone(),
    }
}

/// Query period as `24h` when it is whole hours, otherwise `90m`.
#[must_use]
pub fn format_period(minutes: u64) -> String {
    if minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else {
        format!("{minutes}m")
    }
}

/// Builds messages from configuration and cycle results.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: Config,
}

impl Renderer {
    /// Creates a renderer for `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    fn check_time(&self, now: DateTime<Utc>) -> String {
        format_clock(local_time(now, self.config.clock.utc_offset_hours))
    }

    /// Startup banner with the monitoring parameters.
    #[must_use]
    pub fn startup(&self) -> Message {
        let monitor = &self.config.monitor;
        Message::from_text(
            MessageClass::Info,
            &format!(
                "EARTHQUAKE MONITOR\n\nStarting...\n\n{}\nLat: {:.2}\nLon: {:.2}\nRadius: {}km",
                monitor.name, monitor.latitude, monitor.longitude, monitor.radius_km
            ),
        )
    }

    /// The network link is down; the cycle was skipped.
    #[must_use]
    pub fn network_down(&self, now: DateTime<Utc>) -> Message {
        Message::from_text(
            MessageClass::Warning,
            &format!(
                "NETWORK DOWN\n\nReconnecting...\n\nRetrying in\n{} seconds\nLast check: {}",
                self.config.schedule.error_cooldown_secs,
                self.check_time(now)
            ),
        )
    }

    /// The network could not be reached at startup.
    #[must_use]
    pub fn startup_failed(&self, attempts: u32) -> Message {
        Message::from_text(
            MessageClass::Error,
            &format!("NETWORK FAILED\n\nCould not connect\nafter {attempts} attempt(s)"),
        )
    }

    /// The feed could not be fetched.
    #[must_use]
    pub fn connection_error(&self, now: DateTime<Utc>) -> Message {
        Message::from_text(
            MessageClass::Warning,
            &format!(
                "CONNECTION ERROR\n\nFeed unavailable\nRetrying in {}s\n\nLast check: {}",
                self.config.schedule.error_cooldown_secs,
                self.check_time(now)
            ),
        )
    }

    /// No events within the radius.
    #[must_use]
    pub fn all_clear(&self, total_found: usize, now: DateTime<Utc>) -> Message {
        Message::from_text(
            MessageClass::Success,
            &format!(
                "== ALL CLEAR ==\n\nNo earthquakes\nin {}km radius\n\nWorldwide {}: {total_found}\nLast check: {}",
                self.config.monitor.radius_km,
                format_period(self.config.feed.query_period_minutes),
                self.check_time(now)
            ),
        )
    }

    /// A single earthquake, the strongest of the cycle.
    #[must_use]
    pub fn earthquake(&self, quake: &Earthquake) -> Message {
        Message::from_text(
            MessageClass::Alert,
            &format!(
                "!!! EARTHQUAKE !!!\n\nMag: {:.1}\n{}\nDist: {:.0}km\n\nTime: {}",
                quake.magnitude,
                quake.short_place(self.config.display.place_max_length),
                quake.distance_km,
                format_event_time(quake, self.config.clock.utc_offset_hours)
            ),
        )
    }

    /// Listing of newly seen earthquakes.
    #[must_use]
    pub fn new_earthquakes(&self, new_events: &[Earthquake], total_found: usize) -> Message {
        let limit = self.config.display.list_limit;
        let mut text = format!(
            "EARTHQUAKE ALERT!\n{} new in {}km (of {total_found} worldwide)",
            new_events.len(),
            self.config.monitor.radius_km
        );
        for (i, quake) in new_events.iter().take(limit).enumerate() {
            text.push_str(&format!(
                "\n{}. M{:.1} {} {:.0}km {}",
                i + 1,
                quake.magnitude,
                quake.short_place(self.config.display.place_max_length),
                quake.distance_km,
                format_event_time(quake, self.config.clock.utc_offset_hours)
            ));
        }
        if new_events.len() > limit {
            text.push_str(&format!("\n... and {} more", new_events.len() - limit));
        }
        Message::from_text(MessageClass::Alert, &text)
    }

    /// Plain-text daily summary for push delivery. Event times are UTC.
    #[must_use]
    pub fn daily_summary(&self, events: &[Earthquake], total_found: usize) -> String {
        let period = format_period(self.config.feed.query_period_minutes);
        if events.is_empty() {
            return format!(
                "No earthquakes detected in your area in the last {period}.\n\
                 Total earthquakes found worldwide: {total_found}"
            );
        }

        let monitor = &self.config.monitor;
        let limit = self.config.notify.list_limit;
        let mut text = format!(
            "Last {period}\nLocation: {:.4}, {:.4}\nRadius: {:.1}km\n\
             Found {} earthquake(s) in your area (out of {total_found} total worldwide):\n",
            monitor.latitude,
            monitor.longitude,
            monitor.radius_km,
            events.len()
        );
        for (i, quake) in events.iter().take(limit).enumerate() {
            let time = quake.time.map_or_else(
                || quake.raw_time.clone(),
                |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
            );
            text.push_str(&format!(
                "\n{}. Magnitude {:.1} - {}\n   {time}\n   Distance: {:.1}km\n",
                i + 1,
                quake.magnitude,
                quake.place,
                quake.distance_km
            ));
        }
        if events.len() > limit {
            text.push_str(&format!("\n... and {} more earthquakes", events.len() - limit));
        }
        text
    }

    /// An unexpected failure inside a cycle.
    #[must_use]
    pub fn runtime_error(&self, error: &str) -> Message {
        let error = truncate_chars(error, self.config.display.error_message_max_length);
        Message::from_text(
            MessageClass::Error,
            &format!("RUNTIME ERROR\n\n{error}\n\nRestarting loop..."),
        )
    }

    /// Shutdown notice.
    #[must_use]
    pub fn stopping(&self) -> Message {
        Message::from_text(MessageClass::Info, "STOPPING...")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use quake_watch_event_models::EventId;

    use super::*;

    fn quake(magnitude: f64, place: &str) -> Earthquake {
        Earthquake {
            id: EventId::new(place),
            magnitude,
            latitude: 36.7,
            longitude: -3.9,
            place: place.to_string(),
            time: Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()),
            raw_time: "2024-01-15T14:30:00Z".to_string(),
            distance_km: 12.4,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 15, 5, 0).unwrap()
    }

    #[test]
    fn earthquake_message_truncates_place_and_uses_local_time() {
        let renderer = Renderer::new(Config::default());
        let message = renderer.earthquake(&quake(3.46, "STRAIT OF GIBRALTAR REGION"));
        assert_eq!(message.class, MessageClass::Alert);
        assert_eq!(message.title, "!!! EARTHQUAKE !!!");
        assert_eq!(
            message.lines,
            ["Mag: 3.5", "STRAIT OF GIBRALTAR ", "Dist: 12km", "", "Time: 16:30"]
        );
    }

    #[test]
    fn all_clear_reports_worldwide_total() {
        let renderer = Renderer::new(Config::default());
        let message = renderer.all_clear(42, now());
        assert_eq!(message.class, MessageClass::Success);
        assert!(message.lines.contains(&"in 400km radius".to_string()));
        assert!(message.lines.contains(&"Worldwide 24h: 42".to_string()));
        assert!(message.lines.contains(&"Last check: 17:05".to_string()));
    }

    #[test]
    fn listing_is_capped() {
        let mut config = Config::default();
        config.display.list_limit = 2;
        let renderer = Renderer::new(config);
        let events = [quake(1.0, "A"), quake(2.0, "B"), quake(3.0, "C")];
        let message = renderer.new_earthquakes(&events, 9);
        assert_eq!(message.lines[0], "3 new in 400km (of 9 worldwide)");
        assert_eq!(message.lines[1], "1. M1.0 A 12km 16:30");
        assert_eq!(message.lines.last().unwrap(), "... and 1 more");
        assert_eq!(message.lines.len(), 4);
    }

    #[test]
    fn runtime_error_is_truncated() {
        let mut config = Config::default();
        config.display.error_message_max_length = 5;
        let message = Renderer::new(config).runtime_error("display exploded");
        assert_eq!(message.class, MessageClass::Error);
        assert_eq!(message.lines[0], "displ");
    }

    #[test]
    fn unparsed_event_time_shows_raw_text() {
        let mut q = quake(2.0, "X");
        q.time = None;
        q.raw_time = "15/01 14:30".to_string();
        assert_eq!(format_event_time(&q, 2), "15/01 14:30");
        q.raw_time.clear();
        assert_eq!(format_event_time(&q, 2), NO_TIME);
    }

    #[test]
    fn period_formatting() {
        assert_eq!(format_period(1440), "24h");
        assert_eq!(format_period(90), "90m");
    }

    #[test]
    fn daily_summary_lists_events_in_utc() {
        let mut config = Config::default();
        config.notify.list_limit = 1;
        let renderer = Renderer::new(config);
        let summary = renderer.daily_summary(&[quake(3.46, "ALBORAN SEA"), quake(2.0, "B")], 40);

        assert!(summary.starts_with("Last 24h\nLocation: 36.7506, -3.8739\nRadius: 400.0km\n"));
        assert!(summary.contains("Found 2 earthquake(s) in your area (out of 40 total worldwide):"));
        assert!(summary.contains("1. Magnitude 3.5 - ALBORAN SEA\n   2024-01-15 14:30 UTC\n   Distance: 12.4km"));
        assert!(!summary.contains("2. Magnitude"));
        assert!(summary.ends_with("... and 1 more earthquakes"));
    }

    #[test]
    fn daily_summary_without_nearby_events() {
        let summary = Renderer::new(Config::default()).daily_summary(&[], 17);
        assert_eq!(
            summary,
            "No earthquakes detected in your area in the last 24h.\nTotal earthquakes found worldwide: 17"
        );
    }
}
