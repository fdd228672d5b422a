//! Discord webhook transport: one POST, bounded timeout, no retry.

use super::NotifyError;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Wire payload. Serialized with serde so quotes, newlines and backslashes
/// in the message are always escaped correctly.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
}

pub struct WebhookClient {
    inner: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, url })
    }

    /// Single delivery attempt. The caller decides whether a failure matters.
    pub async fn post(&self, content: &str) -> Result<(), NotifyError> {
        let resp = self
            .inner
            .post(&self.url)
            .json(&WebhookPayload { content })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }

        debug!("Webhook accepted message ({} bytes)", content.len());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
