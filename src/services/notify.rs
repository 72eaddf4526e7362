//! Outbound notifications after scheduling and generation runs.
//!
//! Delivery is best effort: senders report success as a `bool`, log their own
//! failures and never retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::data::models::Notification;
use crate::data::store::MatchStore;

pub const CHANNEL_IN_APP: &str = "in_app";
pub const AUDIENCE_ATTENDEES: &str = "attendees";
pub const AUDIENCE_ORGANIZERS: &str = "organizers";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> bool;
}

/// Writes notifications into the `notifications` table for the console to pick up.
pub struct TableNotifier {
    store: Arc<dyn MatchStore>,
}

impl TableNotifier {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for TableNotifier {
    async fn send(&self, notification: &Notification) -> bool {
        match self.store.insert_notification(notification).await {
            Ok(()) => {
                debug!(
                    event_id = notification.event_id,
                    title = %notification.title,
                    "Notification stored"
                );
                true
            }
            Err(e) => {
                warn!(event_id = notification.event_id, error = ?e, "Failed to store notification");
                false
            }
        }
    }
}

/// POSTs each notification as JSON to a configured endpoint.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> bool {
        let result = self
            .http
            .post(self.url.clone())
            .json(notification)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(
                    event_id = notification.event_id,
                    status = resp.status().as_u16(),
                    "Webhook notification delivered"
                );
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(
                    event_id = notification.event_id,
                    status = status.as_u16(),
                    body = %body,
                    "Webhook rejected notification"
                );
                false
            }
            Err(e) => {
                warn!(event_id = notification.event_id, error = ?e, "Webhook notification failed");
                false
            }
        }
    }
}
