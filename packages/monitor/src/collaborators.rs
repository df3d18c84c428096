//! Seams between the monitor loop and the outside world.
//!
//! The loop only talks to a screen, a speaker, the network, and a clock
//! through these traits. Console implementations live in
//! [`crate::console`]; a device build supplies its own.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use quake_watch_event_models::MessageClass;

/// A rendered message: a title line plus body lines, tagged with a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Severity tag selecting the title styling.
    pub class: MessageClass,
    /// First line of the message.
    pub title: String,
    /// Remaining lines. Blank lines are kept as spacing.
    pub lines: Vec<String>,
}

impl Message {
    /// Splits `text` into a title (first line) and body lines. Leading and
    /// trailing blank body lines are dropped.
    #[must_use]
    pub fn from_text(class: MessageClass, text: &str) -> Self {
        let mut lines = text.lines();
        let title = lines.next().unwrap_or_default().trim().to_string();
        let mut body: Vec<String> = lines.map(str::to_string).collect();

        while body.last().is_some_and(|l| l.trim().is_empty()) {
            body.pop();
        }
        let leading = body.iter().take_while(|l| l.trim().is_empty()).count();

        Self {
            class,
            title,
            lines: body.split_off(leading),
        }
    }

    /// Body lines that fit in `max_lines`.
    #[must_use]
    pub fn visible_lines(&self, max_lines: usize) -> &[String] {
        &self.lines[..self.lines.len().min(max_lines)]
    }
}

/// Renders messages.
pub trait Screen: Send {
    /// Shows `message`, replacing whatever was shown before.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output device fails.
    fn show(&mut self, message: &Message) -> std::io::Result<()>;

    /// Sets backlight brightness in percent.
    fn set_brightness(&mut self, percent: u8);
}

/// Plays tones. Calls return immediately; playback is not awaited.
pub trait Speaker: Send {
    /// Starts a tone.
    fn tone(&mut self, frequency_hz: u32, duration_ms: u64);
}

/// Network link checks.
#[async_trait]
pub trait Network: Send + Sync {
    /// Returns `true` when the link is usable, reconnecting if needed.
    async fn ensure_connected(&self) -> bool;
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Local time as UTC plus a fixed number of hours (no DST database).
#[must_use]
pub fn local_time(utc: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDateTime {
    utc.naive_utc() + Duration::hours(i64::from(utc_offset_hours))
}
