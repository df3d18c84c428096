#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Decides which in-range earthquakes are new.
//!
//! Two modes share the same event identities:
//!
//! * **Single strongest** ([`LastAlerted`]): only the strongest event of a
//!   cycle is considered, and it alerts once per identity until a cycle
//!   comes back empty.
//! * **Set membership** ([`ShownIds`]): every event not seen before is
//!   reported, and the set of shown identities is persisted through
//!   [`store::ShownIdStore`] with time-based eviction.

pub mod store;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use quake_watch_event_models::{Earthquake, EventId};

/// Errors that can occur while persisting dedupe state.
#[derive(Debug, thiserror::Error)]
pub enum DedupeError {
    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The shown-id set could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the strongest event by magnitude.
///
/// Ties go to the event that appears first in feed order.
#[must_use]
pub fn strongest(events: &[Earthquake]) -> Option<&Earthquake> {
    events.iter().fold(None, |best, quake| match best {
        Some(b) if b.magnitude >= quake.magnitude => Some(b),
        _ => Some(quake),
    })
}

/// Outcome of presenting the strongest event to [`LastAlerted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    /// The event differs from the last alerted one and should alert.
    New,
    /// The event was already alerted; display it without re-alerting.
    Repeat,
}

/// Single-strongest dedupe state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastAlerted {
    last: Option<EventId>,
}

impl LastAlerted {
    /// Creates empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Identity of the most recently alerted event.
    #[must_use]
    pub const fn last(&self) -> Option<&EventId> {
        self.last.as_ref()
    }

    /// Classifies `id` against the last alerted event without recording it.
    #[must_use]
    pub fn novelty(&self, id: &EventId) -> Novelty {
        if self.last.as_ref() == Some(id) {
            Novelty::Repeat
        } else {
            Novelty::New
        }
    }

    /// Records `id` as the last alerted event.
    pub fn record(&mut self, id: &EventId) {
        log::debug!("Recording {id} as alerted (previous: {:?})", self.last);
        self.last = Some(id.clone());
    }

    /// Records `id` as this cycle's strongest event.
    pub fn observe(&mut self, id: &EventId) -> Novelty {
        let novelty = self.novelty(id);
        match novelty {
            Novelty::New => self.record(id),
            Novelty::Repeat => log::debug!("Event {id} already alerted"),
        }
        novelty
    }

    /// Forgets the last alerted event so it alerts again if it reappears.
    pub fn clear(&mut self) {
        if self.last.take().is_some() {
            log::debug!("No events in range, clearing last alerted event");
        }
    }
}

/// Set of identities already surfaced to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShownIds {
    ids: BTreeSet<EventId>,
}

impl ShownIds {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Number of remembered identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `id` was already shown.
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Iterates identities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &EventId> {
        self.ids.iter()
    }

    /// Returns the events whose identity has not been shown, in feed order.
    ///
    /// An identity repeated within `events` is returned once.
    #[must_use]
    pub fn unseen<'a>(&self, events: &'a [Earthquake]) -> Vec<&'a Earthquake> {
        let mut batch = BTreeSet::new();
        let mut fresh = Vec::new();
        for quake in events {
            if !self.ids.contains(&quake.id) && batch.insert(&quake.id) {
                fresh.push(quake);
            }
        }
        fresh
    }

    /// Marks identities as shown.
    pub fn insert_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a EventId>) {
        self.ids.extend(ids.into_iter().cloned());
    }

    /// Removes identities whose embedded event time is older than
    /// `now - window`. Identities without a parseable time are kept.
    ///
    /// Returns the number of evicted identities.
    pub fn evict_stale(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let cutoff = now
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.ids.len();
        self.ids
            .retain(|id| id.embedded_time().is_none_or(|time| time >= cutoff));
        let evicted = before - self.ids.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} shown event(s) older than {cutoff}");
        }
        evicted
    }
}

impl FromIterator<EventId> for ShownIds {
    fn from_iter<T: IntoIterator<Item = EventId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn quake(id: &str, magnitude: f64) -> Earthquake {
        Earthquake {
            id: EventId::new(id),
            magnitude,
            latitude: 36.7,
            longitude: -3.9,
            place: "SOUTHERN SPAIN".to_string(),
            time: None,
            raw_time: String::new(),
            distance_km: 12.0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn strongest_picks_max_magnitude() {
        let events = [quake("a", 2.0), quake("b", 4.5), quake("c", 3.0)];
        assert_eq!(strongest(&events).map(|e| e.id.as_str()), Some("b"));
        assert_eq!(strongest(&[]), None);
    }

    #[test]
    fn strongest_tie_goes_to_first_in_feed_order() {
        let events = [quake("a", 1.0), quake("first", 3.0), quake("second", 3.0)];
        assert_eq!(strongest(&events).map(|e| e.id.as_str()), Some("first"));
    }

    #[test]
    fn single_strongest_realerts_after_empty_cycle() {
        let mut state = LastAlerted::new();
        let a = EventId::new("A");

        assert_eq!(state.observe(&a), Novelty::New);
        assert_eq!(state.observe(&a), Novelty::Repeat);
        state.clear();
        assert_eq!(state.last(), None);
        assert_eq!(state.observe(&a), Novelty::New);
    }

    #[test]
    fn single_strongest_alerts_on_a_different_event() {
        let mut state = LastAlerted::new();
        assert_eq!(state.observe(&EventId::new("A")), Novelty::New);
        assert_eq!(state.observe(&EventId::new("B")), Novelty::New);
        assert_eq!(state.last().map(EventId::as_str), Some("B"));
    }

    #[test]
    fn unseen_excludes_shown_and_batch_duplicates() {
        let mut shown = ShownIds::new();
        shown.insert_all([&EventId::new("old")]);

        let events = [quake("old", 2.0), quake("new", 3.0), quake("new", 3.0), quake("other", 1.0)];
        let ids: Vec<&str> = shown.unseen(&events).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["new", "other"]);
    }

    #[test]
    fn evicts_only_old_parseable_ids() {
        let old = EventId::composite(2.0, 36.0, -4.0, Some(now() - Duration::hours(72)), "");
        let recent = EventId::composite(2.0, 36.0, -4.0, Some(now() - Duration::hours(1)), "");
        let opaque = EventId::new("20240101_0000001");
        let garbled = EventId::new("2.0|36.0000|-4.0000|sometime");

        let mut shown: ShownIds =
            [old.clone(), recent.clone(), opaque.clone(), garbled.clone()].into_iter().collect();
        assert_eq!(shown.evict_stale(now(), Duration::hours(48)), 1);

        assert!(!shown.contains(&old));
        assert!(shown.contains(&recent));
        assert!(shown.contains(&opaque));
        assert!(shown.contains(&garbled));
    }

    #[test]
    fn novelty_does_not_record_until_asked() {
        let mut state = LastAlerted::new();
        let a = EventId::new("A");

        assert_eq!(state.novelty(&a), Novelty::New);
        assert_eq!(state.novelty(&a), Novelty::New);
        assert_eq!(state.last(), None);

        state.record(&a);
        assert_eq!(state.novelty(&a), Novelty::Repeat);
    }

    #[test]
    fn eviction_with_unbounded_window_keeps_everything() {
        let old = EventId::composite(2.0, 36.0, -4.0, Some(now() - Duration::hours(72)), "");
        let mut shown: ShownIds = [old.clone()].into_iter().collect();

        assert_eq!(shown.evict_stale(now(), Duration::MAX), 0);
        assert!(shown.contains(&old));
    }
}
