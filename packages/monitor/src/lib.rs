#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Earthquake monitor loop.
//!
//! [`Monitor`] owns the configuration and dedupe state and drives the
//! cycle `poll → decide → alert → render → wait` against the collaborator
//! traits in [`collaborators`]. Terminal adapters live in [`console`]. When
//! a notifier is supplied, a daily summary goes out after the first
//! successful fetch past its slot.

pub mod collaborators;
pub mod console;
pub mod monitor;
pub mod render;

pub use collaborators::{Clock, Message, Network, Screen, Speaker, SystemClock};
pub use monitor::{Collaborators, CycleOutcome, Monitor, MonitorState, Phase, play_tones};
pub use render::Renderer;

/// Errors that can occur while running the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The screen failed to show a message.
    #[error("display error: {0}")]
    Screen(#[from] std::io::Error),

    /// The network was unreachable at startup.
    #[error("network unreachable after {attempts} attempt(s)")]
    Startup {
        /// Connection attempts made.
        attempts: u32,
    },
}
