//! Feed payload parsing.
//!
//! A payload is parsed one feature at a time. Each feature produces a
//! [`FeatureOutcome`]; skipped features are logged and dropped so one bad
//! entry never hides the entries after it.

use chrono::{DateTime, NaiveDateTime, Utc};
use quake_watch_config::FeedDialect;
use quake_watch_event_models::{Earthquake, EventId, IdentityScheme};
use quake_watch_geo::MonitorPoint;
use serde_json::Value;

use crate::{FeedError, FeedResult};

/// Place text used when the feed omits a region name.
pub const UNKNOWN_PLACE: &str = "Unknown";

/// Everything needed to turn raw features into filtered [`Earthquake`]s.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    /// Payload layout.
    pub dialect: FeedDialect,
    /// Origin for distance calculations.
    pub point: MonitorPoint,
    /// Inclusive distance cutoff.
    pub radius_km: f64,
    /// How event identities are derived.
    pub identity: IdentityScheme,
}

/// Why a feature was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The feature is not a JSON object.
    NotAnObject,
    /// `properties` is missing or not an object.
    MissingProperties,
    /// `geometry.coordinates` is missing or not an array.
    MissingCoordinates,
    /// `geometry.coordinates` has fewer than two elements.
    ShortCoordinates,
    /// Longitude or latitude is not a number.
    NonNumericCoordinates,
}

/// Result of parsing a single feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    /// The feature parsed.
    Parsed(Earthquake),
    /// The feature was dropped.
    Skipped(SkipReason),
}

/// Parses an ISO-8601 event time.
///
/// Accepts RFC 3339 (any offset), and naive `YYYY-MM-DDTHH:MM:SS` with
/// optional fractional seconds and optional trailing `Z`, read as UTC.
#[must_use]
pub fn parse_event_time_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = s.strip_suffix('Z').unwrap_or(s);
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    None
}

/// Parses a `time` property that is either an ISO string or an epoch
/// millisecond number. Returns the parsed time and the raw text.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_event_time(value: Option<&Value>) -> (Option<DateTime<Utc>>, String) {
    match value {
        Some(Value::String(s)) => (parse_event_time_str(s), s.clone()),
        Some(Value::Number(n)) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64));
            (millis.and_then(DateTime::from_timestamp_millis), n.to_string())
        }
        _ => (None, String::new()),
    }
}

/// Returns the first non-empty string found under `keys` in `object`.
fn first_string<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Parses one feed feature. The distance is computed but not filtered.
#[must_use]
pub fn parse_feature(feature: &Value, ctx: &ParseContext) -> FeatureOutcome {
    let Some(feature_obj) = feature.as_object() else {
        return FeatureOutcome::Skipped(SkipReason::NotAnObject);
    };
    let Some(properties) = feature_obj.get("properties").and_then(Value::as_object) else {
        return FeatureOutcome::Skipped(SkipReason::MissingProperties);
    };
    let Some(coordinates) = feature_obj
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
    else {
        return FeatureOutcome::Skipped(SkipReason::MissingCoordinates);
    };
    if coordinates.len() < 2 {
        return FeatureOutcome::Skipped(SkipReason::ShortCoordinates);
    }
    // GeoJSON order: [lon, lat, depth]
    let (Some(longitude), Some(latitude)) = (coordinates[0].as_f64(), coordinates[1].as_f64())
    else {
        return FeatureOutcome::Skipped(SkipReason::NonNumericCoordinates);
    };

    let magnitude = properties
        .get("mag")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let place_keys: &[&str] = match ctx.dialect {
        FeedDialect::Emsc => &["flynn_region", "place"],
        FeedDialect::Usgs => &["place", "flynn_region"],
    };
    let place = first_string(properties, place_keys)
        .unwrap_or(UNKNOWN_PLACE)
        .to_string();

    let (time, raw_time) = parse_event_time(properties.get("time"));

    let id = match ctx.identity {
        IdentityScheme::Provider => first_string(properties, &["unid"])
            .or_else(|| first_string(feature_obj, &["id"]))
            .map_or_else(
                || EventId::composite(magnitude, latitude, longitude, time, &raw_time),
                EventId::new,
            ),
        IdentityScheme::Composite => {
            EventId::composite(magnitude, latitude, longitude, time, &raw_time)
        }
    };

    let distance_km = ctx.point.distance_to(latitude, longitude);

    FeatureOutcome::Parsed(Earthquake {
        id,
        magnitude,
        latitude,
        longitude,
        place,
        time,
        raw_time,
        distance_km,
    })
}

/// Keeps only events within `radius_km` of the monitor point (inclusive).
#[must_use]
pub fn filter_by_radius(events: Vec<Earthquake>, radius_km: f64) -> Vec<Earthquake> {
    events
        .into_iter()
        .filter(|e| e.distance_km <= radius_km)
        .collect()
}

/// Parses a whole feed payload.
///
/// `total_found` counts every feature in the payload, including ones that
/// were later skipped or fell outside the radius.
///
/// # Errors
///
/// Returns [`FeedError::Payload`] if the payload has no `features` array.
pub fn parse_payload(payload: &Value, ctx: &ParseContext) -> Result<FeedResult, FeedError> {
    let features = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| FeedError::Payload {
            message: "No features array in feed response".to_string(),
        })?;

    let total_found = features.len();
    let mut parsed = Vec::with_capacity(total_found);
    let mut skipped = 0usize;

    for (idx, feature) in features.iter().enumerate() {
        match parse_feature(feature, ctx) {
            FeatureOutcome::Parsed(quake) => parsed.push(quake),
            FeatureOutcome::Skipped(reason) => {
                skipped += 1;
                log::debug!("Skipping feature {idx}: {reason:?}");
            }
        }
    }

    if skipped > 0 {
        log::info!("Skipped {skipped} of {total_found} malformed feature(s)");
    }

    let events = filter_by_radius(parsed, ctx.radius_km);
    log::info!(
        "Found {total_found} earthquake(s) worldwide, {} within {:.1}km",
        events.len(),
        ctx.radius_km
    );

    Ok(FeedResult {
        events,
        total_found,
    })
}
