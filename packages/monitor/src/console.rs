//! Terminal implementations of the collaborator traits.

use std::io::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use console::style;
use quake_watch_event_models::MessageClass;

use crate::collaborators::{Message, Network, Screen, Speaker};

/// Brightness below which the console output is dimmed.
const DIM_THRESHOLD_PERCENT: u8 = 50;

/// [`Screen`] that prints to stdout.
#[derive(Debug)]
pub struct ConsoleScreen {
    max_lines: usize,
    brightness: u8,
}

impl ConsoleScreen {
    /// Creates a screen that prints at most `max_lines` body lines.
    #[must_use]
    pub const fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            brightness: 100,
        }
    }

    const fn dimmed(&self) -> bool {
        self.brightness < DIM_THRESHOLD_PERCENT
    }
}

impl Screen for ConsoleScreen {
    fn show(&mut self, message: &Message) -> std::io::Result<()> {
        let title = style(&message.title).bold();
        let title = match message.class {
            MessageClass::Info => title.cyan(),
            MessageClass::Success => title.green(),
            MessageClass::Warning => title.yellow(),
            MessageClass::Error => title.red(),
            MessageClass::Alert => title.red().reverse(),
        };

        let mut out = std::io::stdout().lock();
        writeln!(out)?;
        if self.dimmed() {
            writeln!(out, "{}", title.dim())?;
        } else {
            writeln!(out, "{title}")?;
        }
        for line in message.visible_lines(self.max_lines) {
            if self.dimmed() {
                writeln!(out, "{}", style(line).dim())?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        out.flush()
    }

    fn set_brightness(&mut self, percent: u8) {
        if percent != self.brightness {
            log::debug!("Brightness {}% -> {percent}%", self.brightness);
            self.brightness = percent;
        }
    }
}

/// [`Speaker`] that rings the terminal bell.
#[derive(Debug, Default)]
pub struct ConsoleSpeaker;

impl Speaker for ConsoleSpeaker {
    fn tone(&mut self, frequency_hz: u32, duration_ms: u64) {
        log::debug!("Tone {frequency_hz} Hz for {duration_ms} ms");
        let mut out = std::io::stdout().lock();
        if let Err(e) = write!(out, "\x07").and_then(|()| out.flush()) {
            log::warn!("Failed to ring bell: {e}");
        }
    }
}

/// [`Network`] that is always connected. Used when the host OS manages the
/// link and fetch errors are enough to detect an outage.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

#[async_trait]
impl Network for AlwaysOnline {
    async fn ensure_connected(&self) -> bool {
        true
    }
}

/// [`Network`] that opens a TCP connection to the feed host.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    addr: String,
    timeout: Duration,
}

impl TcpReachability {
    /// Creates a check for the host and port of `url`.
    ///
    /// Returns `None` if `url` has no host or no known port.
    #[must_use]
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let url = reqwest::Url::parse(url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self {
            addr: format!("{host}:{port}"),
            timeout,
        })
    }

    /// The `host:port` being checked.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Network for TcpReachability {
    async fn ensure_connected(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr)).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                log::warn!("Network check to {} failed: {e}", self.addr);
                false
            }
            Err(_) => {
                log::warn!(
                    "Network check to {} timed out after {:?}",
                    self.addr,
                    self.timeout
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_uses_scheme_default_port() {
        let check = TcpReachability::for_url(
            "https://www.seismicportal.eu/fdsnws/event/1/query",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(check.addr(), "www.seismicportal.eu:443");

        let check = TcpReachability::for_url("http://127.0.0.1:8080/q", Duration::from_secs(1)).unwrap();
        assert_eq!(check.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn reachability_rejects_urls_without_host() {
        assert!(TcpReachability::for_url("not a url", Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn reachability_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let check =
            TcpReachability::for_url(&format!("http://127.0.0.1:{port}/"), Duration::from_secs(2))
                .unwrap();
        assert!(check.ensure_connected().await);

        drop(listener);
        assert!(!check.ensure_connected().await);
    }

    #[test]
    fn screen_tracks_brightness() {
        let mut screen = ConsoleScreen::new(8);
        assert!(!screen.dimmed());
        screen.set_brightness(20);
        assert!(screen.dimmed());
    }
}
