//! The polling loop.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Timelike as _, Utc};
use quake_watch_alert::{AlertDecision, AlertPolicy, ToneSpec};
use quake_watch_config::{Config, DedupeMode};
use quake_watch_dedupe::store::ShownIdStore;
use quake_watch_dedupe::{LastAlerted, Novelty, ShownIds, strongest};
use quake_watch_event_models::Earthquake;
use quake_watch_feed::{EarthquakeFeed, FeedResult, QueryWindow};
use quake_watch_notify::{Notifier, SummarySchedule};
use strum_macros::{AsRefStr, Display};

use crate::MonitorError;
use crate::collaborators::{Clock, Network, Screen, Speaker, local_time};
use crate::render::Renderer;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Checking the network and fetching the feed.
    Polling,
    /// Picking the strongest event and checking novelty.
    Deciding,
    /// Playing tones.
    Alerting,
    /// Sending the daily summary.
    Notifying,
    /// Updating the screen.
    Rendering,
    /// Sleeping until the next cycle.
    Waiting,
}

/// Dedupe state owned by the loop.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    /// Single-strongest mode state.
    pub last_alerted: LastAlerted,
    /// Set-membership mode state.
    pub shown: ShownIds,
    /// Daily summary slot, present when a notifier is configured.
    pub summary: Option<SummarySchedule>,
}

/// The outside world as seen by the loop.
pub struct Collaborators {
    /// Event source.
    pub feed: Box<dyn EarthquakeFeed>,
    /// Display.
    pub screen: Box<dyn Screen>,
    /// Tone output.
    pub speaker: Box<dyn Speaker>,
    /// Connectivity checks.
    pub network: Box<dyn Network>,
    /// Time source.
    pub clock: Box<dyn Clock>,
    /// Daily summary delivery. `None` disables the summary.
    pub notifier: Option<Box<dyn Notifier>>,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The network was down; nothing was fetched.
    Offline,
    /// The feed could not be fetched.
    FetchFailed {
        /// Error text.
        error: String,
    },
    /// The feed answered with no events in range.
    AllClear {
        /// Features in the payload worldwide.
        total_found: usize,
    },
    /// At least one event in range.
    Events {
        /// Features in the payload worldwide.
        total_found: usize,
        /// Events within the radius.
        in_range: usize,
        /// Strongest in-range event.
        strongest: Earthquake,
        /// Events not reported before this cycle.
        new_events: Vec<Earthquake>,
        /// Tone decision, `None` when nothing new was found.
        alert: Option<AlertDecision>,
    },
}

impl CycleOutcome {
    /// Whether the next wait should be the error cooldown.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Offline | Self::FetchFailed { .. })
    }
}

fn minutes(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .unwrap_or(chrono::Duration::MAX)
}

fn hours(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .unwrap_or(chrono::Duration::MAX)
}

/// Plays `tone.count` tones, pausing between repetitions.
///
/// [`Speaker::tone`] returns immediately, so each wait covers the tone
/// itself plus `pause_ms`. No wait follows the last tone.
pub async fn play_tones(
    speaker: &mut dyn Speaker,
    tone: ToneSpec,
    frequency_hz: u32,
    pause_ms: u64,
) {
    for i in 0..tone.count {
        speaker.tone(frequency_hz, tone.duration_ms);
        if i + 1 < tone.count {
            let wait = tone.duration_ms.saturating_add(pause_ms);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
    }
}

/// Polls the feed, decides, alerts, and renders, one cycle at a time.
pub struct Monitor {
    config: Config,
    policy: AlertPolicy,
    renderer: Renderer,
    store: Option<ShownIdStore>,
    state: MonitorState,
    phase: Phase,
    collab: Collaborators,
}

impl Monitor {
    /// Creates a monitor. In set-membership mode the shown-event file is
    /// loaded here.
    #[must_use]
    pub fn new(config: Config, collab: Collaborators) -> Self {
        let now = collab.clock.now_utc();
        let mut state = MonitorState::default();
        let store = match config.dedupe.mode {
            DedupeMode::SetMembership => {
                let store = ShownIdStore::new(&config.dedupe.state_path);
                state.shown = store.load(now, hours(config.dedupe.window_hours));
                Some(store)
            }
            DedupeMode::SingleStrongest => None,
        };
        if collab.notifier.is_some() {
            let local_now = local_time(now, config.clock.utc_offset_hours);
            state.summary = SummarySchedule::from_config(&config.notify, local_now);
            match &state.summary {
                Some(schedule) => log::info!("Daily summary at {}", schedule.at()),
                None => log::warn!(
                    "Ignoring notifier, notify.daily_at {:?} is not HH:MM",
                    config.notify.daily_at
                ),
            }
        }

        Self {
            policy: AlertPolicy::from_config(&config.alert),
            renderer: Renderer::new(config.clone()),
            config,
            store,
            state,
            phase: Phase::Idle,
            collab,
        }
    }

    /// Current loop phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Dedupe state.
    #[must_use]
    pub const fn state(&self) -> &MonitorState {
        &self.state
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("Phase {} -> {phase}", self.phase);
            self.phase = phase;
        }
    }

    fn save_shown(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.state.shown)
        {
            log::warn!(
                "Failed to save shown events to {}: {e}",
                store.path().display()
            );
        }
    }

    async fn send_summary_if_due(&mut self, now: DateTime<Utc>, result: &FeedResult) {
        let local_now = local_time(now, self.config.clock.utc_offset_hours);
        if !self
            .state
            .summary
            .as_ref()
            .is_some_and(|s| s.is_due(local_now))
        {
            return;
        }

        self.set_phase(Phase::Notifying);
        let message = self
            .renderer
            .daily_summary(&result.events, result.total_found);
        if let Some(notifier) = &self.collab.notifier {
            match notifier.send(&message).await {
                Ok(()) => log::info!("Daily summary sent"),
                Err(e) => log::warn!("Failed to send daily summary: {e}"),
            }
        }
        if let Some(schedule) = &mut self.state.summary {
            schedule.mark_sent(local_now);
        }
    }

    fn local_hour(&self, now: DateTime<Utc>) -> u8 {
        let hour = local_time(now, self.config.clock.utc_offset_hours).hour();
        u8::try_from(hour).unwrap_or_default()
    }

    /// Shows the startup banner and, when required, waits for the network.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::Startup`] if the network stays unreachable after
    ///   `network.max_retries` attempts
    /// * [`MonitorError::Screen`] if the banner cannot be shown
    pub async fn startup(&mut self) -> Result<(), MonitorError> {
        self.collab.screen.show(&self.renderer.startup())?;
        if !self.config.network.required_at_startup {
            return Ok(());
        }

        let attempts = self.config.network.max_retries.max(1);
        let delay = Duration::from_secs(self.config.network.retry_delay_secs);
        for attempt in 1..=attempts {
            if self.collab.network.ensure_connected().await {
                log::info!("Network connected (attempt {attempt}/{attempts})");
                return Ok(());
            }
            log::warn!("Network not reachable (attempt {attempt}/{attempts})");
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        self.collab
            .screen
            .show(&self.renderer.startup_failed(attempts))?;
        Err(MonitorError::Startup { attempts })
    }

    /// Runs one polling cycle.
    ///
    /// Feed failures are reported through [`CycleOutcome::FetchFailed`];
    /// dedupe save and summary delivery failures are logged and do not fail
    /// the cycle. Events only count as reported once their message has been
    /// shown, so a screen error leaves them new for the next cycle.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Screen`] if the screen rejects a message.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, MonitorError> {
        let now = self.collab.clock.now_utc();
        let hour = self.local_hour(now);
        let display = &self.config.display;
        let brightness = if self.policy.is_quiet(hour) {
            display.dim_brightness_percent
        } else {
            display.normal_brightness_percent
        };
        self.collab.screen.set_brightness(brightness);

        self.set_phase(Phase::Polling);
        if !self.collab.network.ensure_connected().await {
            log::warn!("Network down, skipping cycle");
            self.set_phase(Phase::Rendering);
            self.collab.screen.show(&self.renderer.network_down(now))?;
            return Ok(CycleOutcome::Offline);
        }

        let feed = &self.config.feed;
        let window = QueryWindow::ending_at(
            now,
            minutes(feed.query_period_minutes),
            feed.include_end_time,
            feed.min_magnitude,
        );
        let result = match self.collab.feed.fetch(&window).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Feed fetch failed: {e}");
                self.set_phase(Phase::Rendering);
                self.collab
                    .screen
                    .show(&self.renderer.connection_error(now))?;
                return Ok(CycleOutcome::FetchFailed {
                    error: e.to_string(),
                });
            }
        };
        log::info!(
            "Found {} earthquake(s) worldwide, {} within {}km",
            result.total_found,
            result.events.len(),
            self.config.monitor.radius_km
        );

        self.send_summary_if_due(now, &result).await;

        self.set_phase(Phase::Deciding);
        let mode = self.config.dedupe.mode;
        if mode == DedupeMode::SetMembership {
            let window = hours(self.config.dedupe.window_hours);
            self.state.shown.evict_stale(now, window);
        }

        let Some(top) = strongest(&result.events).cloned() else {
            self.state.last_alerted.clear();
            self.set_phase(Phase::Rendering);
            self.collab
                .screen
                .show(&self.renderer.all_clear(result.total_found, now))?;
            self.save_shown();
            return Ok(CycleOutcome::AllClear {
                total_found: result.total_found,
            });
        };

        let new_events: Vec<Earthquake> = match mode {
            DedupeMode::SingleStrongest => match self.state.last_alerted.novelty(&top.id) {
                Novelty::New => vec![top.clone()],
                Novelty::Repeat => {
                    log::debug!("Event {} already alerted", top.id);
                    Vec::new()
                }
            },
            DedupeMode::SetMembership => self
                .state
                .shown
                .unseen(&result.events)
                .into_iter()
                .cloned()
                .collect(),
        };

        let alert = strongest(&new_events).map(|q| self.policy.decide(q.magnitude, hour));
        if let Some(AlertDecision::Sound(tone)) = alert {
            self.set_phase(Phase::Alerting);
            play_tones(
                self.collab.speaker.as_mut(),
                tone,
                self.policy.tone_frequency_hz,
                self.policy.inter_tone_pause_ms,
            )
            .await;
        }

        self.set_phase(Phase::Rendering);
        let listing = mode == DedupeMode::SetMembership;
        let message = if listing && !new_events.is_empty() {
            self.renderer.new_earthquakes(&new_events, result.total_found)
        } else {
            self.renderer.earthquake(&top)
        };
        self.collab.screen.show(&message)?;

        match mode {
            DedupeMode::SingleStrongest => {
                if !new_events.is_empty() {
                    self.state.last_alerted.record(&top.id);
                }
            }
            DedupeMode::SetMembership => {
                self.state.shown.insert_all(new_events.iter().map(|q| &q.id));
                log::debug!(
                    "{} new of {} in range, {} shown total",
                    new_events.len(),
                    result.events.len(),
                    self.state.shown.len()
                );
            }
        }
        self.save_shown();

        Ok(CycleOutcome::Events {
            total_found: result.total_found,
            in_range: result.events.len(),
            strongest: top,
            new_events,
            alert,
        })
    }

    /// Runs cycles until `shutdown` resolves.
    ///
    /// `shutdown` is only polled while waiting between cycles, so a cycle in
    /// progress always completes. A failed cycle shows a runtime error and
    /// waits the error cooldown before the next one.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Screen`] if the stop notice cannot be shown.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), MonitorError>
    where
        F: Future<Output = ()>,
    {
        let interval = Duration::from_secs(self.config.schedule.interval_secs);
        let cooldown = Duration::from_secs(self.config.schedule.error_cooldown_secs);
        tokio::pin!(shutdown);

        loop {
            let wait = match self.run_cycle().await {
                Ok(outcome) if outcome.is_failure() => cooldown,
                Ok(_) => interval,
                Err(e) => {
                    log::error!("Monitor cycle failed: {e}");
                    let message = self.renderer.runtime_error(&e.to_string());
                    if let Err(e) = self.collab.screen.show(&message) {
                        log::error!("Failed to show runtime error: {e}");
                    }
                    cooldown
                }
            };

            self.set_phase(Phase::Waiting);
            log::debug!("Next cycle in {wait:?}");
            tokio::select! {
                () = &mut shutdown => break,
                () = tokio::time::sleep(wait) => {}
            }
        }

        log::info!("Stopping monitor");
        self.set_phase(Phase::Idle);
        self.collab.screen.show(&self.renderer.stopping())?;
        Ok(())
    }
}
