//! Notification sinks: where formatted messages are delivered

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::error::DispatchError;
use crate::config::HttpConfig;

/// Appended to content cut at the length cap
pub const TRUNCATION_MARKER: &str = "…(truncated)";

/// Delivers one message to one endpoint
///
/// Each call is exactly one delivery attempt. Retries, if any, are the
/// sink's business; the dispatcher never loops.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, url: &str, text: &str) -> Result<(), DispatchError>;
}

/// Chat-style webhook: POST `{"content": text}`, success on any 2xx
pub struct WebhookSink {
    http: Client,
    timeout: Duration,
    max_message_chars: usize,
}

impl WebhookSink {
    pub fn new(timeout: Duration, max_message_chars: usize) -> Result<Self, DispatchError> {
        debug!(?timeout, max_message_chars, "WebhookSink::new: called");
        let http = Client::builder().timeout(timeout).build().map_err(DispatchError::Network)?;
        Ok(Self {
            http,
            timeout,
            max_message_chars,
        })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, DispatchError> {
        Self::new(Duration::from_millis(config.timeout_ms), config.max_message_chars)
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, url: &str, text: &str) -> Result<(), DispatchError> {
        debug!(%url, len = text.len(), "WebhookSink::send: called");
        let parsed = reqwest::Url::parse(url).map_err(|_| DispatchError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DispatchError::InvalidUrl(url.to_string()));
        }

        let content = truncate_content(text, self.max_message_chars);
        if let Cow::Owned(_) = content {
            warn!(%url, max = self.max_message_chars, "WebhookSink::send: message truncated");
        }

        let response = self
            .http
            .post(parsed)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(self.timeout)
                } else {
                    DispatchError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(%url, %status, "WebhookSink::send: delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Http {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
///
/// The marker is left off when `max_chars` has no room for it.
pub fn truncate_content(text: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return Cow::Owned(text.chars().take(max_chars).collect());
    }
    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}
