//! Notification delivery.
//!
//! The lifecycle core decides what to send; sinks only deliver it.
//! Delivery is fire-and-forget: a failed send is logged, never propagated
//! into the transition path.

use async_trait::async_trait;
use tracing::{info, warn};

use ridepool_common::Notification;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, notification: &Notification);
}

/// Default sink: structured log lines only. Used when no webhook is
/// configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, n: &Notification) {
        info!(
            kind = n.kind.as_str(),
            target = %n.target_user_id,
            ride = %n.ride_id,
            "notification"
        );
    }
}

/// POSTs each notification as JSON to a configured webhook (e.g. a push
/// gateway). The request is spawned so a slow receiver cannot stall the
/// transition response.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn publish(&self, n: &Notification) {
        let request = self.client.post(&self.url).json(n);
        let kind = n.kind.as_str();
        let ride = n.ride_id;
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(kind, ride = %ride, status = %resp.status(), "notification webhook rejected");
                }
                Err(e) => {
                    warn!(kind, ride = %ride, error = %e, "notification webhook failed");
                }
                Ok(_) => {}
            }
        });
    }
}
