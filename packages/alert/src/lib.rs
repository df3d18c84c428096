#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Alert intensity policy.
//!
//! Maps magnitude to a tone pattern, applies quiet hours, and picks the
//! message class the display renders for a cycle.

pub mod quiet_hours;

use quake_watch_config::AlertSection;
use quake_watch_event_models::MessageClass;
use strum_macros::{AsRefStr, Display};

pub use quiet_hours::QuietHours;

/// Magnitudes at or above this always sound, even during quiet hours.
pub const QUIET_HOURS_OVERRIDE_MAGNITUDE: f64 = 5.0;

/// Magnitudes below this never sound.
pub const MIN_AUDIBLE_MAGNITUDE: f64 = 1.0;

/// A tone pattern: `count` beeps of `duration_ms` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneSpec {
    /// Number of repetitions.
    pub count: u32,
    /// Length of each tone.
    pub duration_ms: u64,
}

/// Why no tone is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SuppressReason {
    /// Magnitude below [`MIN_AUDIBLE_MAGNITUDE`].
    BelowThreshold,
    /// Inside quiet hours and below [`QUIET_HOURS_OVERRIDE_MAGNITUDE`].
    QuietHours,
}

/// Whether and how to sound an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Play the tone pattern.
    Sound(ToneSpec),
    /// Stay silent; the display still updates.
    Suppressed(SuppressReason),
}

/// Tone pattern for `magnitude`, ignoring quiet hours.
///
/// | magnitude  | count | ms  |
/// |------------|-------|-----|
/// | < 1.0      | -     | -   |
/// | [1.0, 2.0) | 1     | 100 |
/// | [2.0, 3.0) | 2     | 100 |
/// | [3.0, 4.0) | 3     | 100 |
/// | [4.0, 5.0) | 4     | 300 |
/// | [5.0, 6.0) | 5     | 500 |
/// | ≥ 6.0      | 10    | 500 |
#[must_use]
pub fn tone_for(magnitude: f64) -> Option<ToneSpec> {
    let (count, duration_ms) = match magnitude {
        m if m >= 6.0 => (10, 500),
        m if m >= 5.0 => (5, 500),
        m if m >= 4.0 => (4, 300),
        m if m >= 3.0 => (3, 100),
        m if m >= 2.0 => (2, 100),
        m if m >= MIN_AUDIBLE_MAGNITUDE => (1, 100),
        _ => return None,
    };
    Some(ToneSpec { count, duration_ms })
}

/// Alert decision for `magnitude` given whether quiet hours are active.
#[must_use]
pub fn alert_for(magnitude: f64, quiet_hours_active: bool) -> AlertDecision {
    let Some(tone) = tone_for(magnitude) else {
        return AlertDecision::Suppressed(SuppressReason::BelowThreshold);
    };
    if quiet_hours_active && magnitude < QUIET_HOURS_OVERRIDE_MAGNITUDE {
        return AlertDecision::Suppressed(SuppressReason::QuietHours);
    }
    AlertDecision::Sound(tone)
}

/// Configured alert policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Do-not-disturb window.
    pub quiet_hours: QuietHours,
    /// Frequency for every tone.
    pub tone_frequency_hz: u32,
    /// Pause between repetitions.
    pub inter_tone_pause_ms: u64,
}

impl AlertPolicy {
    /// Builds the policy from the `[alert]` section.
    #[must_use]
    pub const fn from_config(config: &AlertSection) -> Self {
        Self {
            quiet_hours: QuietHours::new(config.quiet_start_hour, config.quiet_end_hour),
            tone_frequency_hz: config.tone_frequency_hz,
            inter_tone_pause_ms: config.inter_tone_pause_ms,
        }
    }

    /// Whether quiet hours are active at `local_hour`.
    #[must_use]
    pub const fn is_quiet(&self, local_hour: u8) -> bool {
        self.quiet_hours.contains(local_hour)
    }

    /// Alert decision for `magnitude` at `local_hour`.
    #[must_use]
    pub fn decide(&self, magnitude: f64, local_hour: u8) -> AlertDecision {
        let decision = alert_for(magnitude, self.is_quiet(local_hour));
        log::info!("Alert decision for M{magnitude:.1} at {local_hour:02}h: {decision:?}");
        decision
    }
}

/// What a polling cycle found, as far as rendering is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFinding {
    /// The feed could not be fetched.
    FetchFailed,
    /// The feed answered with no in-range events.
    NoEvents,
    /// At least one in-range event.
    Events,
}

/// Message class for a cycle: fetch failure warns, nothing nearby is all
/// clear, anything nearby alerts.
#[must_use]
pub const fn message_class(finding: CycleFinding) -> MessageClass {
    match finding {
        CycleFinding::FetchFailed => MessageClass::Warning,
        CycleFinding::NoEvents => MessageClass::Success,
        CycleFinding::Events => MessageClass::Alert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn sound(count: u32, duration_ms: u64) -> AlertDecision {
        AlertDecision::Sound(ToneSpec { count, duration_ms })
    }

    #[test]
    fn magnitude_bands() {
        let cases = [
            (0.5, None),
            (0.99, None),
            (1.0, Some((1, 100))),
            (1.99, Some((1, 100))),
            (2.0, Some((2, 100))),
            (3.5, Some((3, 100))),
            (4.0, Some((4, 300))),
            (4.9, Some((4, 300))),
            (5.0, Some((5, 500))),
            (5.99, Some((5, 500))),
            (6.0, Some((10, 500))),
            (8.8, Some((10, 500))),
        ];
        for (magnitude, expected) in cases {
            let expected = expected.map(|(count, duration_ms)| ToneSpec { count, duration_ms });
            assert_eq!(tone_for(magnitude), expected, "magnitude {magnitude}");
        }
    }

    #[test]
    fn alert_for_table_fixtures() {
        assert_eq!(alert_for(4.9, false), sound(4, 300));
        assert_eq!(alert_for(6.0, false), sound(10, 500));
        assert_eq!(
            alert_for(0.5, false),
            AlertDecision::Suppressed(SuppressReason::BelowThreshold)
        );
    }

    #[test]
    fn quiet_hours_suppress_below_five() {
        let policy = AlertPolicy::from_config(&AlertSection::default());
        assert_eq!(
            policy.decide(3.0, 23),
            AlertDecision::Suppressed(SuppressReason::QuietHours)
        );
        assert_eq!(policy.decide(3.0, 10), sound(3, 100));
        assert_eq!(policy.decide(5.5, 23), sound(5, 500));
        assert_eq!(policy.decide(4.99, 3), AlertDecision::Suppressed(SuppressReason::QuietHours));
    }

    #[test]
    fn below_threshold_wins_over_quiet_hours() {
        assert_eq!(
            alert_for(0.2, true),
            AlertDecision::Suppressed(SuppressReason::BelowThreshold)
        );
    }

    #[test]
    fn message_classes() {
        assert_eq!(message_class(CycleFinding::FetchFailed), MessageClass::Warning);
        assert_eq!(message_class(CycleFinding::NoEvents), MessageClass::Success);
        assert_eq!(message_class(CycleFinding::Events), MessageClass::Alert);
    }

    #[test]
    fn suppress_reason_names() {
        assert_eq!(SuppressReason::QuietHours.to_string(), "quiet_hours");
    }
}
