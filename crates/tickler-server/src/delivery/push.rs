//! Push channel: POST the reminder to each subscription endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use tickler_core::Subscription;

use super::{DeliveryError, ReminderMessage};

/// Sends a reminder to one subscription.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &Subscription, message: &ReminderMessage) -> Result<(), DeliveryError>;
}

/// Delivers the reminder as a JSON POST to the subscription endpoint.
///
/// The subscription's `keys` are forwarded alongside the notification so a
/// relay can encrypt for the subscriber.
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, subscription: &Subscription, message: &ReminderMessage) -> Result<(), DeliveryError> {
        let payload = json!({
            "notification": message,
            "keys": subscription.keys,
        });

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("push request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
