#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the quake watch monitor.
//!
//! [`Config`] is deserialized from TOML. Every field carries a default, so
//! an empty file (or no file at all) yields a working configuration for the
//! default monitor point. Each component receives the section it needs at
//! construction time; nothing reads configuration from globals.

use std::path::{Path, PathBuf};

use quake_watch_event_models::IdentityScheme;
use quake_watch_geo::{EARTH_RADIUS_KM, MonitorPoint};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_PATH_ENV: &str = "QUAKE_WATCH_CONFIG";

/// Overrides `monitor.latitude`.
pub const LATITUDE_ENV: &str = "QUAKE_WATCH_LATITUDE";

/// Overrides `monitor.longitude`.
pub const LONGITUDE_ENV: &str = "QUAKE_WATCH_LONGITUDE";

/// Overrides `monitor.radius_km`.
pub const RADIUS_ENV: &str = "QUAKE_WATCH_RADIUS_KM";

/// Overrides `notify.user_key`.
pub const PUSHOVER_USER_KEY_ENV: &str = "QUAKE_WATCH_PUSHOVER_USER_KEY";

/// Overrides `notify.app_token`.
pub const PUSHOVER_APP_TOKEN_ENV: &str = "QUAKE_WATCH_PUSHOVER_APP_TOKEN";

/// Overrides `notify.daily_at`.
pub const DAILY_AT_ENV: &str = "QUAKE_WATCH_DAILY_AT";

/// Overrides `notify.run_immediately`; only `true` enables it.
pub const RUN_IMMEDIATELY_ENV: &str = "QUAKE_WATCH_RUN_IMMEDIATELY";

/// Longest accepted feed query window: one leap year.
pub const MAX_QUERY_PERIOD_MINUTES: u64 = 366 * 24 * 60;

/// Longest accepted shown-event retention: ten leap years.
pub const MAX_WINDOW_HOURS: u64 = 10 * 366 * 24;

/// Longest accepted sleep or timeout: one week.
pub const MAX_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest accepted pause between tones.
pub const MAX_TONE_PAUSE_MS: u64 = 60_000;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Env {
        /// Environment variable name.
        key: &'static str,
        /// The raw value found.
        value: String,
    },

    /// A field holds a value outside its accepted range.
    #[error("invalid config: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the monitor is and how far it looks.
    pub monitor: MonitorSection,
    /// Remote feed query settings.
    pub feed: FeedSection,
    /// Tone and quiet-hours settings.
    pub alert: AlertSection,
    /// Local-time derivation.
    pub clock: ClockSection,
    /// Rendering limits and brightness.
    pub display: DisplaySection,
    /// Poll interval and error cooldown.
    pub schedule: ScheduleSection,
    /// Connectivity gate.
    pub network: NetworkSection,
    /// Dedupe mode, identity scheme, and persisted state.
    pub dedupe: DedupeSection,
    /// Daily push summary.
    pub notify: NotifySection,
}

impl Config {
    /// Parses a TOML document and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is not valid TOML or a value
    /// is out of range.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, falling back to the file named by
    /// [`CONFIG_PATH_ENV`], then to defaults. Environment overrides are
    /// applied on top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path, source })?;
                toml::from_str(&contents)?
            }
            None => {
                log::info!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the location and notification overrides, reading variables
    /// through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a present location variable is not a
    /// number.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &'static str| -> Result<Option<f64>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| ConfigError::Env { key, value })
                })
                .transpose()
        };

        if let Some(latitude) = parse(LATITUDE_ENV)? {
            self.monitor.latitude = latitude;
        }
        if let Some(longitude) = parse(LONGITUDE_ENV)? {
            self.monitor.longitude = longitude;
        }
        if let Some(radius) = parse(RADIUS_ENV)? {
            self.monitor.radius_km = radius;
        }

        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        if let Some(user_key) = text(PUSHOVER_USER_KEY_ENV) {
            self.notify.user_key = Some(user_key);
        }
        if let Some(app_token) = text(PUSHOVER_APP_TOKEN_ENV) {
            self.notify.app_token = Some(app_token);
        }
        if let Some(daily_at) = text(DAILY_AT_ENV) {
            self.notify.daily_at = daily_at;
        }
        if let Some(run_immediately) = text(RUN_IMMEDIATELY_ENV) {
            self.notify.run_immediately = run_immediately == "true";
        }
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if !(-90.0..=90.0).contains(&self.monitor.latitude) {
            return invalid(format!(
                "monitor.latitude {} is outside [-90, 90]",
                self.monitor.latitude
            ));
        }
        if !(-180.0..=180.0).contains(&self.monitor.longitude) {
            return invalid(format!(
                "monitor.longitude {} is outside [-180, 180]",
                self.monitor.longitude
            ));
        }
        if self.monitor.radius_km.is_nan() || self.monitor.radius_km <= 0.0 {
            return invalid(format!(
                "monitor.radius_km must be positive, got {}",
                self.monitor.radius_km
            ));
        }
        if self.monitor.earth_radius_km.is_nan() || self.monitor.earth_radius_km <= 0.0 {
            return invalid(format!(
                "monitor.earth_radius_km must be positive, got {}",
                self.monitor.earth_radius_km
            ));
        }
        for (name, hour) in [
            ("alert.quiet_start_hour", self.alert.quiet_start_hour),
            ("alert.quiet_end_hour", self.alert.quiet_end_hour),
        ] {
            if hour >= 24 {
                return invalid(format!("{name} must be below 24, got {hour}"));
            }
        }
        if !(-12..=14).contains(&self.clock.utc_offset_hours) {
            return invalid(format!(
                "clock.utc_offset_hours {} is outside [-12, 14]",
                self.clock.utc_offset_hours
            ));
        }
        if self.schedule.interval_secs == 0 {
            return invalid("schedule.interval_secs must be at least 1".to_string());
        }
        for (name, secs) in [
            ("schedule.interval_secs", self.schedule.interval_secs),
            ("schedule.error_cooldown_secs", self.schedule.error_cooldown_secs),
            ("network.retry_delay_secs", self.network.retry_delay_secs),
            ("network.connect_timeout_secs", self.network.connect_timeout_secs),
            ("feed.http_timeout_secs", self.feed.http_timeout_secs),
        ] {
            if secs > MAX_DELAY_SECS {
                return invalid(format!("{name} must be at most {MAX_DELAY_SECS}, got {secs}"));
            }
        }
        if self.alert.inter_tone_pause_ms > MAX_TONE_PAUSE_MS {
            return invalid(format!(
                "alert.inter_tone_pause_ms must be at most {MAX_TONE_PAUSE_MS}, got {}",
                self.alert.inter_tone_pause_ms
            ));
        }
        if self.display.max_lines == 0 {
            return invalid("display.max_lines must be at least 1".to_string());
        }
        if !(1..=MAX_QUERY_PERIOD_MINUTES).contains(&self.feed.query_period_minutes) {
            return invalid(format!(
                "feed.query_period_minutes {} is outside [1, {MAX_QUERY_PERIOD_MINUTES}]",
                self.feed.query_period_minutes
            ));
        }
        if self.dedupe.window_hours > MAX_WINDOW_HOURS {
            return invalid(format!(
                "dedupe.window_hours must be at most {MAX_WINDOW_HOURS}, got {}",
                self.dedupe.window_hours
            ));
        }
        self.notify.validate()
    }

    /// Renders the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

// ── Monitor point ────────────────────────────────────────────────────────

/// The fixed monitoring coordinate and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Human-readable label for the location.
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Events farther than this are out of range. Inclusive.
    pub radius_km: f64,
    /// Sphere radius for the haversine formula.
    pub earth_radius_km: f64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            name: "Nerja, Spain".to_string(),
            latitude: 36.7506,
            longitude: -3.8739,
            radius_km: 400.0,
            earth_radius_km: EARTH_RADIUS_KM,
        }
    }
}

impl MonitorSection {
    /// Returns the configured origin for distance calculations.
    #[must_use]
    pub const fn point(&self) -> MonitorPoint {
        MonitorPoint::new(self.latitude, self.longitude).with_earth_radius(self.earth_radius_km)
    }
}

// ── Feed ─────────────────────────────────────────────────────────────────

/// Which feed payload layout to expect.
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
pub enum FeedDialect {
    /// EMSC seismic portal: `flynn_region`, ISO `time`, `unid`.
    #[default]
    Emsc,
    /// USGS `GeoJSON`: `place`, epoch-millisecond `time`, feature `id`.
    Usgs,
}

impl FeedDialect {
    /// The public FDSN event endpoint for this dialect.
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Emsc => "https://www.seismicportal.eu/fdsnws/event/1/query",
            Self::Usgs => "https://earthquake.usgs.gov/fdsnws/event/1/query",
        }
    }

    /// Value of the `format` query parameter.
    #[must_use]
    pub const fn format_param(self) -> &'static str {
        match self {
            Self::Emsc => "json",
            Self::Usgs => "geojson",
        }
    }
}

/// Remote feed query settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    /// Payload layout.
    pub dialect: FeedDialect,
    /// Endpoint override. Defaults to the dialect's public endpoint.
    pub base_url: Option<String>,
    /// `minmag` query parameter.
    pub min_magnitude: f64,
    /// Length of the query window ending now.
    pub query_period_minutes: u64,
    /// Send an explicit `endtime` equal to now.
    pub include_end_time: bool,
    /// Total request timeout.
    pub http_timeout_secs: u64,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            dialect: FeedDialect::Emsc,
            base_url: None,
            min_magnitude: 0.0,
            query_period_minutes: 24 * 60,
            include_end_time: true,
            http_timeout_secs: 30,
        }
    }
}

impl FeedSection {
    /// The endpoint to query.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_base_url())
    }
}

// ── Alert ────────────────────────────────────────────────────────────────

/// Tone and quiet-hours settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSection {
    /// First local hour of the do-not-disturb window.
    pub quiet_start_hour: u8,
    /// Local hour at which the do-not-disturb window ends (exclusive).
    pub quiet_end_hour: u8,
    /// Tone frequency.
    pub tone_frequency_hz: u32,
    /// Pause between repetitions.
    pub inter_tone_pause_ms: u64,
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            quiet_start_hour: 23,
            quiet_end_hour: 9,
            tone_frequency_hz: 1000,
            inter_tone_pause_ms: 50,
        }
    }
}

// ── Clock ────────────────────────────────────────────────────────────────

/// Local time is UTC plus a fixed offset; there is no DST handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    /// Hours added to UTC.
    pub utc_offset_hours: i32,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            utc_offset_hours: 2,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────

/// Rendering limits and brightness levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Body lines rendered per message; the rest are dropped.
    pub max_lines: usize,
    /// Place names are cut to this many characters.
    pub place_max_length: usize,
    /// Runtime error text is cut to this many characters.
    pub error_message_max_length: usize,
    /// Events listed per cycle in set-membership mode.
    pub list_limit: usize,
    /// Brightness outside quiet hours.
    pub normal_brightness_percent: u8,
    /// Brightness during quiet hours.
    pub dim_brightness_percent: u8,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            max_lines: 8,
            place_max_length: 20,
            error_message_max_length: 60,
            list_limit: 10,
            normal_brightness_percent: 100,
            dim_brightness_percent: 20,
        }
    }
}

// ── Schedule ─────────────────────────────────────────────────────────────

/// Loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval_secs: u64,
    /// Sleep after a failed cycle.
    pub error_cooldown_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            error_cooldown_secs: 60,
        }
    }
}

// ── Network ──────────────────────────────────────────────────────────────

/// Connectivity gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Abort startup when the network cannot be reached.
    pub required_at_startup: bool,
    /// Startup connection attempts.
    pub max_retries: u32,
    /// Delay between startup attempts.
    pub retry_delay_secs: u64,
    /// Timeout for a single reachability check.
    pub connect_timeout_secs: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            required_at_startup: false,
            max_retries: 2,
            retry_delay_secs: 5,
            connect_timeout_secs: 10,
        }
    }
}

// ── Dedupe ───────────────────────────────────────────────────────────────

/// How repeat events are recognized.
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
pub enum DedupeMode {
    /// Alert only on the strongest in-range event, once per identity.
    SingleStrongest,
    /// Report every event not yet shown, remembering them across runs.
    #[default]
    SetMembership,
}

/// Dedupe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeSection {
    /// Decision mode.
    pub mode: DedupeMode,
    /// Identity derivation.
    pub identity: IdentityScheme,
    /// Where shown identities are persisted.
    pub state_path: PathBuf,
    /// Shown identities older than this are evicted.
    pub window_hours: u64,
}

impl Default for DedupeSection {
    fn default() -> Self {
        Self {
            mode: DedupeMode::SetMembership,
            identity: IdentityScheme::Composite,
            state_path: PathBuf::from("shown_earthquakes.json"),
            window_hours: 48,
        }
    }
}

// ── Notify ───────────────────────────────────────────────────────────────

/// Parses `HH:MM` (hour 0-23, minute 0-59). A single-digit hour is
/// accepted.
#[must_use]
pub fn parse_hh_mm(text: &str) -> Option<(u32, u32)> {
    let (hour, minute) = text.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Daily Pushover summary of nearby events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// Send the daily summary.
    pub enabled: bool,
    /// Local `HH:MM` at which the summary is due.
    pub daily_at: String,
    /// Also send a summary after the first successful fetch.
    pub run_immediately: bool,
    /// Pushover user key. Never written back out.
    #[serde(skip_serializing)]
    pub user_key: Option<String>,
    /// Pushover application token. Never written back out.
    #[serde(skip_serializing)]
    pub app_token: Option<String>,
    /// Messages endpoint.
    pub api_url: String,
    /// Notification title.
    pub title: String,
    /// Pushover sound name.
    pub sound: String,
    /// Pushover priority, -2 (lowest) to 2 (emergency).
    pub priority: i8,
    /// Nearby events listed before the rest are counted.
    pub list_limit: usize,
    /// Request timeout.
    pub http_timeout_secs: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            enabled: false,
            daily_at: "08:00".to_string(),
            run_immediately: false,
            user_key: None,
            app_token: None,
            api_url: "https://api.pushover.net/1/messages.json".to_string(),
            title: "🌍 Earthquake Alert".to_string(),
            sound: "cosmic".to_string(),
            priority: 0,
            list_limit: 10,
            http_timeout_secs: 30,
        }
    }
}

impl NotifySection {
    /// Scheduled `(hour, minute)`, or `None` when `daily_at` is malformed.
    #[must_use]
    pub fn daily_hour_minute(&self) -> Option<(u32, u32)> {
        parse_hh_mm(&self.daily_at)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if self.daily_hour_minute().is_none() {
            return invalid(format!(
                "notify.daily_at must be HH:MM, got {:?}",
                self.daily_at
            ));
        }
        if !(-2..=2).contains(&self.priority) {
            return invalid(format!(
                "notify.priority {} is outside [-2, 2]",
                self.priority
            ));
        }
        if self.http_timeout_secs > MAX_DELAY_SECS {
            return invalid(format!(
                "notify.http_timeout_secs must be at most {MAX_DELAY_SECS}, got {}",
                self.http_timeout_secs
            ));
        }
        if self.enabled {
            for (name, env, value) in [
                ("notify.user_key", PUSHOVER_USER_KEY_ENV, &self.user_key),
                ("notify.app_token", PUSHOVER_APP_TOKEN_ENV, &self.app_token),
            ] {
                if value.as_deref().is_none_or(str::is_empty) {
                    return invalid(format!("{name} (or {env}) is required when notify is enabled"));
                }
            }
        }
        Ok(())
    }
}
