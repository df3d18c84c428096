//! HTTP transport for the feed.
//!
//! One attempt per call. A failed fetch is reported to the monitor loop,
//! which renders it and waits out its cooldown before polling again.

use crate::FeedError;

/// Maximum length of the response body preview included in errors and logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Truncates `text` to [`BODY_PREVIEW_LEN`] bytes on a char boundary.
fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Sends a GET to `url` and parses the body as JSON.
///
/// # Errors
///
/// Returns [`FeedError::Http`] on connection failures and timeouts,
/// [`FeedError::Status`] on a non-success status, and [`FeedError::Json`]
/// if the body is not JSON.
pub async fn get_json(client: &reqwest::Client, url: &str) -> Result<serde_json::Value, FeedError> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::warn!("Feed request failed with status {status}: {}", preview(&body));
        return Err(FeedError::Status {
            status: status.as_u16(),
            body_preview: preview(&body),
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "Feed JSON parse failed.\n  \
             url: {url}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        FeedError::Json(e)
    })
}
