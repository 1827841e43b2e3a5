//! Post-run notifications.

use std::io::IsTerminal;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NotifyConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook rejected message: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// Sends a short text message to a chat channel.
///
/// Messages are always logged. `force` asks for chat delivery even from an
/// interactive terminal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, force: bool) -> Result<(), NotifyError>;
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str, _force: bool) -> Result<(), NotifyError> {
        info!("{message}");
        Ok(())
    }
}

/// Posts messages to a Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    webhook: String,
    channel: Option<String>,
    force: bool,
}

impl SlackNotifier {
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook: webhook.into(),
            channel: None,
            force: false,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sends every message, even from an interactive terminal.
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Interactive runs stay local unless forced.
    fn should_send(&self, force: bool) -> bool {
        force || self.force || !std::io::stdout().is_terminal()
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str, force: bool) -> Result<(), NotifyError> {
        info!("{message}");
        if !self.should_send(force) {
            return Ok(());
        }

        let mut payload = json!({ "text": message });
        if let Some(channel) = &self.channel {
            payload["channel"] = json!(channel);
        }

        let response = self.client.post(&self.webhook).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Builds the notifier described by the config.
pub fn from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    match &config.slack_webhook {
        Some(webhook) => {
            let mut slack = SlackNotifier::new(webhook.clone()).forced(config.force);
            if let Some(channel) = &config.slack_channel {
                slack = slack.with_channel(channel.clone());
            }
            Box::new(slack)
        }
        None => Box::new(LogNotifier),
    }
}

/// Sends a message, logging instead of failing when delivery fails.
pub async fn notify_quietly(notifier: &dyn Notifier, message: &str, force: bool) {
    if let Err(e) = notifier.notify(message, force).await {
        warn!(error = %e, "Notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        LogNotifier.notify("seeded", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let notifier = SlackNotifier::new("http://127.0.0.1:9/hook");
        assert!(notifier.notify("hello", true).await.is_err());
        notify_quietly(&notifier, "hello", true).await;
    }
}
