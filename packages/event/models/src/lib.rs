#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Earthquake event record and the identity types shared across the
//! quake watch workspace.
//!
//! Every feed dialect produces [`Earthquake`] records. Records are built
//! fresh each polling cycle and never mutated afterwards; the dedupe layer
//! recognizes "the same event" across cycles through its [`EventId`].

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Separator between the fields of a composite [`EventId`].
pub const COMPOSITE_SEPARATOR: char = '|';

/// How an [`EventId`] is derived for a deployment.
///
/// Switching schemes invalidates any persisted dedupe state, so the scheme
/// is fixed in configuration rather than chosen per event.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IdentityScheme {
    /// Use the provider-supplied identifier (`unid` / feature `id`), falling
    /// back to the composite key when the provider omits it.
    Provider,
    /// Derive the identity from magnitude, coordinates, and event time.
    #[default]
    Composite,
}

/// Stable identity of an earthquake across polling cycles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an already-formed identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds the composite identity
    /// `"{magnitude:.1}|{latitude:.4}|{longitude:.4}|{time}"`.
    ///
    /// `time` is RFC 3339 UTC when the event time parsed, otherwise the raw
    /// upstream text.
    #[must_use]
    pub fn composite(
        magnitude: f64,
        latitude: f64,
        longitude: f64,
        time: Option<DateTime<Utc>>,
        raw_time: &str,
    ) -> Self {
        let time = time.map_or_else(
            || raw_time.to_string(),
            |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        Self(format!(
            "{magnitude:.1}{sep}{latitude:.4}{sep}{longitude:.4}{sep}{time}",
            sep = COMPOSITE_SEPARATOR
        ))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the event time embedded in a composite identity.
    ///
    /// Returns `None` for provider identities and for composite keys whose
    /// trailing segment is not an RFC 3339 timestamp.
    #[must_use]
    pub fn embedded_time(&self) -> Option<DateTime<Utc>> {
        let (_, time) = self.0.rsplit_once(COMPOSITE_SEPARATOR)?;
        DateTime::parse_from_rfc3339(time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Render severity tag handed to the display collaborator.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageClass {
    /// Neutral status (startup banner, shutdown).
    Info,
    /// All clear: no events in range.
    Success,
    /// Degraded: the feed could not be fetched or the network is down.
    Warning,
    /// Unexpected runtime failure inside a cycle.
    Error,
    /// An in-range earthquake.
    Alert,
}

/// An earthquake parsed from the feed, with its distance from the monitor
/// point already computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earthquake {
    /// Dedupe identity.
    pub id: EventId,
    /// Magnitude, `0.0` when the feed omits it.
    pub magnitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Region description, `"Unknown"` when absent.
    pub place: String,
    /// Parsed occurrence time. `None` when the upstream value is missing or
    /// unparseable.
    pub time: Option<DateTime<Utc>>,
    /// Upstream time text, kept for display when parsing fails.
    pub raw_time: String,
    /// Great-circle distance in kilometers from the monitor point.
    pub distance_km: f64,
}

impl Earthquake {
    /// Returns the place name cut to at most `max_chars` characters.
    #[must_use]
    pub fn short_place(&self, max_chars: usize) -> &str {
        match self.place.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.place[..idx],
            None => &self.place,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn composite_id_embeds_rfc3339_time() {
        let time = Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap();
        let id = EventId::composite(3.27, 36.75, -3.873_9, Some(time), "ignored");
        assert_eq!(id.as_str(), "3.3|36.7500|-3.8739|2024-01-15T14:30:00Z");
        assert_eq!(id.embedded_time(), Some(time));
    }

    #[test]
    fn composite_id_falls_back_to_raw_time() {
        let id = EventId::composite(1.0, 0.0, 0.0, None, "yesterday");
        assert_eq!(id.as_str(), "1.0|0.0000|0.0000|yesterday");
        assert_eq!(id.embedded_time(), None);
    }

    #[test]
    fn provider_id_has_no_embedded_time() {
        assert_eq!(EventId::new("20240115_0000123").embedded_time(), None);
    }

    #[test]
    fn short_place_respects_char_boundaries() {
        let quake = Earthquake {
            id: EventId::new("x"),
            magnitude: 2.0,
            latitude: 0.0,
            longitude: 0.0,
            place: "CÁDIZ, SPAIN".to_string(),
            time: None,
            raw_time: String::new(),
            distance_km: 0.0,
        };
        assert_eq!(quake.short_place(2), "CÁ");
        assert_eq!(quake.short_place(50), "CÁDIZ, SPAIN");
    }

    #[test]
    fn identity_scheme_parses_from_config_strings() {
        assert_eq!(
            "provider".parse::<IdentityScheme>().unwrap(),
            IdentityScheme::Provider
        );
        assert_eq!(IdentityScheme::default(), IdentityScheme::Composite);
        assert_eq!(MessageClass::Warning.to_string(), "warning");
    }
}
