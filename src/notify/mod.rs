pub mod message;
pub mod webhook;

use crate::config::NotifyConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use self::webhook::WebhookClient;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Delivery failures. Callers above the notification boundary log these
/// and drop them; they never feed into the wrapper's exit status.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

// ── Sink trait ────────────────────────────────────────────────────────────────

/// Swappable delivery sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

// ── Discord webhook sink ──────────────────────────────────────────────────────

/// Discord webhook sink. Without a usable URL the sink is disabled and
/// accepts every message without sending anything.
pub struct DiscordNotifier {
    client: Option<WebhookClient>,
}

impl DiscordNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        if !config.enabled {
            debug!("Notifications disabled by config");
            return Self { client: None };
        }

        let Some(raw) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            warn!("No webhook URL configured, notifications disabled");
            return Self { client: None };
        };

        if Url::parse(raw).is_err() {
            warn!("Webhook URL does not parse, notifications disabled");
            return Self { client: None };
        }

        match WebhookClient::new(raw.to_string(), Duration::from_secs(config.timeout_secs)) {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(e) => {
                warn!("Could not build webhook client: {}", e);
                Self { client: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let Some(client) = &self.client else {
            debug!("Notifier disabled, dropping message");
            return Ok(());
        };
        client.post(message).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(url: Option<&str>) -> NotifyConfig {
        NotifyConfig {
            webhook_url: url.map(str::to_string),
            ..NotifyConfig::default()
        }
    }

    #[test]
    fn test_enabled_with_valid_url() {
        let notifier = DiscordNotifier::new(&config_with(Some(
            "https://discord.com/api/webhooks/123/token",
        )));
        assert!(notifier.is_enabled());
    }

    #[test]
    fn test_disabled_without_url() {
        assert!(!DiscordNotifier::new(&config_with(None)).is_enabled());
        assert!(!DiscordNotifier::new(&config_with(Some(""))).is_enabled());
    }

    #[test]
    fn test_disabled_with_unparseable_url() {
        assert!(!DiscordNotifier::new(&config_with(Some("not a url"))).is_enabled());
    }

    #[test]
    fn test_disabled_by_flag() {
        let config = NotifyConfig {
            webhook_url: Some("https://discord.com/api/webhooks/123/token".to_string()),
            enabled: false,
            ..NotifyConfig::default()
        };
        assert!(!DiscordNotifier::new(&config).is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_sink_accepts_messages() {
        let notifier = DiscordNotifier::disabled();
        assert!(notifier.send("dropped on the floor").await.is_ok());
    }
}
