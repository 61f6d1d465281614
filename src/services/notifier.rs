//! Change notification service.
//!
//! Push delivery is best-effort: a failed notification is logged and never
//! fails the sync that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{NotifierConfig, SourceConfig};

/// A push message addressed to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
}

/// Transport for push notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Posts notifications as JSON to a webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(notification)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AppError::notify)?;
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        log::info!(
            "Notification [{}] {}: {}",
            notification.topic,
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// Pick the transport configured in `[notifier]`.
pub fn build_notifier(config: &NotifierConfig, client: Client) -> Arc<dyn Notifier> {
    match &config.endpoint {
        Some(endpoint) if !endpoint.trim().is_empty() => {
            Arc::new(WebhookNotifier::new(client, endpoint.trim()))
        }
        _ => Arc::new(LogNotifier),
    }
}

/// Builds change messages for a source and swallows delivery failures.
#[derive(Clone)]
pub struct ChangeNotifier {
    transport: Arc<dyn Notifier>,
    config: NotifierConfig,
}

impl ChangeNotifier {
    pub fn new(transport: Arc<dyn Notifier>, config: NotifierConfig) -> Self {
        Self { transport, config }
    }

    /// The message announcing a schedule change for `source`.
    pub fn message_for(&self, source: &SourceConfig) -> Notification {
        let fill = |template: &str| {
            template
                .replace("{name}", &source.name)
                .replace("{id}", &source.id)
        };
        Notification {
            topic: format!("{}{}", self.config.topic_prefix, source.id),
            title: fill(&self.config.title),
            body: fill(&self.config.body),
            image_url: self.config.image_url.clone(),
        }
    }

    /// Announce a change. Returns whether delivery succeeded.
    pub async fn notify_change(&self, source: &SourceConfig) -> bool {
        let message = self.message_for(source);
        match self.transport.notify(&message).await {
            Ok(()) => {
                log::info!("[{}] change notification sent to {}", source.id, message.topic);
                true
            }
            Err(e) => {
                log::error!("[{}] change notification failed: {}", source.id, e);
                false
            }
        }
    }
}
