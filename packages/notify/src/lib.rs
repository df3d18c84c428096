#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Daily push summary.
//!
//! [`Notifier`] is the delivery seam; [`PushoverNotifier`] posts to the
//! Pushover messages API. [`schedule::SummarySchedule`] decides when the
//! monitor loop should send.

pub mod schedule;

use std::time::Duration;

use async_trait::async_trait;
use quake_watch_config::NotifySection;

pub use schedule::SummarySchedule;

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 200;

/// Errors that can occur while sending a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Connection failure, timeout, or body read failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with something other than `200 OK`.
    #[error("notification service returned HTTP {status}: {body_preview}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body_preview: String,
    },

    /// A credential needed to build the client is absent.
    #[error("missing notification credential {field}")]
    MissingCredentials {
        /// Config field that was empty.
        field: &'static str,
    },
}

/// Delivers a text notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails.
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn credential(value: Option<&String>, field: &'static str) -> Result<String, NotifyError> {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or(NotifyError::MissingCredentials { field })
}

/// [`Notifier`] backed by the Pushover messages API.
pub struct PushoverNotifier {
    client: reqwest::Client,
    api_url: String,
    user_key: String,
    app_token: String,
    title: String,
    sound: String,
    priority: String,
}

impl PushoverNotifier {
    /// Creates a client from the `[notify]` section.
    ///
    /// # Errors
    ///
    /// * [`NotifyError::MissingCredentials`] if the user key or app token
    ///   is unset
    /// * [`NotifyError::Http`] if the HTTP client cannot be built
    pub fn new(section: &NotifySection) -> Result<Self, NotifyError> {
        let user_key = credential(section.user_key.as_ref(), "user_key")?;
        let app_token = credential(section.app_token.as_ref(), "app_token")?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("quake_watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(section.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: section.api_url.clone(),
            user_key,
            app_token,
            title: section.title.clone(),
            sound: section.sound.clone(),
            priority: section.priority.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let form = [
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("message", message),
            ("title", self.title.as_str()),
            ("priority", self.priority.as_str()),
            ("sound", self.sound.as_str()),
        ];

        log::debug!("Posting notification to {}", self.api_url);
        let response = self.client.post(&self.api_url).form(&form).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Notification rejected with status {status}");
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body_preview: preview(&body),
            });
        }

        log::info!("Notification sent");
        Ok(())
    }
}
