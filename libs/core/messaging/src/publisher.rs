//! Publishing side of the bus.

use async_nats::jetstream::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::error::BusError;
use crate::{AUTH_TOPIC, DAILY_TOPIC};

/// Encode a confirmation email request for the `auth` topic.
pub fn encode_auth(email: &str, key: &str, method: &str) -> String {
    format!("{} {} {}", email, key, method)
}

/// Encode a daily delivery request for the `daily` topic.
pub fn encode_daily(email: &str, nickname: &str) -> String {
    format!("{} {}", email, nickname)
}

/// The dispatch seam used by the user-handling service.
///
/// Publishes are synchronous: implementations return only once the broker
/// has acknowledged the message.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Request a confirmation email for the given operation.
    async fn publish_auth(&self, email: &str, key: &str, method: &str) -> Result<(), BusError>;

    /// Request the daily delivery for one subscriber.
    async fn publish_daily(&self, email: &str, nickname: &str) -> Result<(), BusError>;
}

/// JetStream-backed [`Publisher`].
#[derive(Clone)]
pub struct BusPublisher {
    jetstream: Context,
}

impl BusPublisher {
    pub fn new(jetstream: Context) -> Self {
        Self { jetstream }
    }

    async fn publish(&self, topic: &'static str, value: String) -> Result<(), BusError> {
        let ack = self
            .jetstream
            .publish(topic, value.into_bytes().into())
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?;

        // Wait for the broker acknowledgment; the upstream operation fails
        // if the message was not durably accepted.
        ack.await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?;

        debug!(topic = %topic, "Published message");
        Ok(())
    }
}

#[async_trait]
impl Publisher for BusPublisher {
    async fn publish_auth(&self, email: &str, key: &str, method: &str) -> Result<(), BusError> {
        self.publish(AUTH_TOPIC, encode_auth(email, key, method)).await
    }

    async fn publish_daily(&self, email: &str, nickname: &str) -> Result<(), BusError> {
        self.publish(DAILY_TOPIC, encode_daily(email, nickname)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_auth() {
        assert_eq!(
            encode_auth("arbuz@gmail.com", "s0mek3y", "ADD"),
            "arbuz@gmail.com s0mek3y ADD"
        );
    }

    #[test]
    fn test_encode_daily() {
        assert_eq!(encode_daily("arbuz@gmail.com", "arbuz"), "arbuz@gmail.com arbuz");
    }
}
