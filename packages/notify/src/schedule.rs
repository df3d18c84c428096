//! When the daily summary is due.
//!
//! The summary is due once per local day, at the first check on or after
//! the configured time. Starting after that time waits for the next day,
//! unless `run_immediately` asks for one summary straight away.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use quake_watch_config::NotifySection;

/// Tracks the daily slot and the last day a summary went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySchedule {
    at: NaiveTime,
    last_sent: Option<NaiveDate>,
    immediate: bool,
}

impl SummarySchedule {
    /// Creates a schedule for a monitor starting at `local_now`.
    #[must_use]
    pub fn new(at: NaiveTime, run_immediately: bool, local_now: NaiveDateTime) -> Self {
        let last_sent = (local_now.time() >= at).then(|| local_now.date());
        Self {
            at,
            last_sent,
            immediate: run_immediately,
        }
    }

    /// Builds the schedule from `[notify]`, or `None` when `daily_at` does
    /// not parse.
    #[must_use]
    pub fn from_config(section: &NotifySection, local_now: NaiveDateTime) -> Option<Self> {
        let (hour, minute) = section.daily_hour_minute()?;
        let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self::new(at, section.run_immediately, local_now))
    }

    /// Local time of the daily slot.
    #[must_use]
    pub const fn at(&self) -> NaiveTime {
        self.at
    }

    /// Local day of the last scheduled summary.
    #[must_use]
    pub const fn last_sent(&self) -> Option<NaiveDate> {
        self.last_sent
    }

    /// Whether a summary should be sent at `local_now`.
    #[must_use]
    pub fn is_due(&self, local_now: NaiveDateTime) -> bool {
        self.immediate || (local_now.time() >= self.at && self.last_sent != Some(local_now.date()))
    }

    /// Records a send attempt at `local_now`. Attempts count whether or not
    /// delivery succeeded.
    pub fn mark_sent(&mut self, local_now: NaiveDateTime) {
        self.immediate = false;
        if local_now.time() >= self.at {
            self.last_sent = Some(local_now.date());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn eight() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn due_once_per_day_at_first_check_after_slot() {
        let mut schedule = SummarySchedule::new(eight(), false, local(15, 6, 0));
        assert!(!schedule.is_due(local(15, 7, 59)));
        assert!(schedule.is_due(local(15, 8, 3)));

        schedule.mark_sent(local(15, 8, 3));
        assert!(!schedule.is_due(local(15, 8, 8)));
        assert!(!schedule.is_due(local(15, 23, 59)));
        assert!(!schedule.is_due(local(16, 7, 0)));
        assert!(schedule.is_due(local(16, 8, 0)));
        assert_eq!(schedule.last_sent(), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn starting_after_slot_waits_for_tomorrow() {
        let schedule = SummarySchedule::new(eight(), false, local(15, 10, 0));
        assert!(!schedule.is_due(local(15, 10, 5)));
        assert!(schedule.is_due(local(16, 8, 0)));
    }

    #[test]
    fn run_immediately_sends_once_then_follows_slot() {
        let mut schedule = SummarySchedule::new(eight(), true, local(15, 7, 0));
        assert!(schedule.is_due(local(15, 7, 0)));

        schedule.mark_sent(local(15, 7, 0));
        assert!(!schedule.is_due(local(15, 7, 30)));
        assert!(schedule.is_due(local(15, 8, 0)));
    }

    #[test]
    fn from_config_reads_daily_at() {
        let section = NotifySection {
            daily_at: "6:30".to_string(),
            ..NotifySection::default()
        };
        let schedule = SummarySchedule::from_config(&section, local(15, 0, 0)).unwrap();
        assert_eq!(schedule.at(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());

        let bad = NotifySection {
            daily_at: "later".to_string(),
            ..NotifySection::default()
        };
        assert_eq!(SummarySchedule::from_config(&bad, local(15, 0, 0)), None);
    }
}
