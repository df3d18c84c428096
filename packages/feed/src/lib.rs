#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Seismic feed client.
//!
//! Builds a time-windowed FDSN query, fetches it over HTTP, and parses the
//! returned features into [`Earthquake`] records within the monitoring
//! radius. A fetch either succeeds with a [`FeedResult`] (possibly with
//! zero events) or fails with a [`FeedError`], so callers can tell "nothing
//! nearby" apart from "could not ask".

pub mod fetch;
pub mod parsing;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use quake_watch_config::{FeedDialect, FeedSection, MonitorSection};
use quake_watch_event_models::{Earthquake, IdentityScheme};

pub use parsing::{FeatureOutcome, ParseContext, SkipReason};
pub use query::QueryWindow;

/// Errors that can occur while fetching the feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Connection failure, timeout, or body read failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("feed returned HTTP {status}: {body_preview}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body_preview: String,
    },

    /// The body is not JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is JSON but not a feature collection.
    #[error("malformed feed payload: {message}")]
    Payload {
        /// Description of what went wrong.
        message: String,
    },
}

/// Events from one successful fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedResult {
    /// In-range events, in feed order.
    pub events: Vec<Earthquake>,
    /// Number of features in the payload before any filtering.
    pub total_found: usize,
}

/// A source of earthquake events.
#[async_trait]
pub trait EarthquakeFeed: Send + Sync {
    /// Fetches the events inside `window`, filtered to the monitor radius.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] on transport failure or a malformed payload.
    async fn fetch(&self, window: &QueryWindow) -> Result<FeedResult, FeedError>;
}

/// [`EarthquakeFeed`] backed by an FDSN HTTP endpoint.
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
    ctx: ParseContext,
}

impl HttpFeed {
    /// Creates a feed client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn new(
        feed: &FeedSection,
        monitor: &MonitorSection,
        identity: IdentityScheme,
    ) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quake_watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(feed.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: feed.base_url().to_string(),
            ctx: ParseContext {
                dialect: feed.dialect,
                point: monitor.point(),
                radius_km: monitor.radius_km,
                identity,
            },
        })
    }

    /// The configured payload layout.
    #[must_use]
    pub const fn dialect(&self) -> FeedDialect {
        self.ctx.dialect
    }
}

#[async_trait]
impl EarthquakeFeed for HttpFeed {
    async fn fetch(&self, window: &QueryWindow) -> Result<FeedResult, FeedError> {
        let url = query::build_query_url(&self.base_url, self.ctx.dialect, window);
        log::info!("Fetching: {url}");

        let payload = fetch::get_json(&self.client, &url).await?;
        parsing::parse_payload(&payload, &self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves a single canned HTTP response and returns the base URL plus a
    /// handle resolving to the request line that was received.
    async fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });
        (format!("http://{addr}/fdsnws/event/1/query"), handle)
    }

    fn feed_for(base_url: String) -> HttpFeed {
        let feed = FeedSection {
            base_url: Some(base_url),
            http_timeout_secs: 5,
            ..FeedSection::default()
        };
        HttpFeed::new(&feed, &MonitorSection::default(), IdentityScheme::Provider).unwrap()
    }

    fn window() -> QueryWindow {
        QueryWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 14, 14, 30, 0).unwrap(),
            end: None,
            min_magnitude: 0.0,
        }
    }

    #[tokio::test]
    async fn fetches_and_filters_features() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "geometry": { "coordinates": [-3.9, 36.7, -5.0] },
                    "properties": {
                        "unid": "X123", "mag": 5.2,
                        "flynn_region": "SOUTHERN SPAIN", "time": "2024-01-15T08:00:00.0Z"
                    }
                },
                {
                    "geometry": { "coordinates": [139.69, 35.68, -30.0] },
                    "properties": { "unid": "T1", "mag": 4.0, "flynn_region": "JAPAN" }
                },
                {
                    "geometry": { "coordinates": [-70.6, -33.4, -80.0] },
                    "properties": { "unid": "C1", "mag": 3.0, "flynn_region": "CHILE" }
                }
            ]
        })
        .to_string();
        let (url, request) = serve_once("200 OK", body).await;

        let result = feed_for(url).fetch(&window()).await.unwrap();
        assert_eq!(result.total_found, 3);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].id.as_str(), "X123");

        let request_line = request.await.unwrap();
        assert!(
            request_line.starts_with(
                "GET /fdsnws/event/1/query?format=json&minmag=0&starttime=2024-01-14T14:30:00"
            ),
            "{request_line}"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_failure() {
        let (url, _request) = serve_once("503 Service Unavailable", "busy".to_string()).await;
        let err = feed_for(url).fetch(&window()).await.unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 503, .. }), "{err}");
    }

    #[tokio::test]
    async fn non_json_body_is_a_fetch_failure() {
        let (url, _request) = serve_once("200 OK", "<html>oops</html>".to_string()).await;
        let err = feed_for(url).fetch(&window()).await.unwrap_err();
        assert!(matches!(err, FeedError::Json(_)), "{err}");
    }

    #[tokio::test]
    async fn connection_refused_is_a_fetch_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = feed_for(format!("http://{addr}/query"))
            .fetch(&window())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Http(_)), "{err}");
    }
}
