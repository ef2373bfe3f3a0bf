//! Mock email provider for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailProvider, OutgoingEmail, SendResult};
use crate::error::{EmailError, EmailResult};

/// Mock email provider that captures sent emails.
#[derive(Clone, Default)]
pub struct MockSmtpProvider {
    sent_emails: Arc<Mutex<Vec<OutgoingEmail>>>,
    should_fail: bool,
}

impl MockSmtpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent_emails: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
        }
    }

    /// Get all sent emails.
    pub async fn sent_emails(&self) -> Vec<OutgoingEmail> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails.
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Check if an email was sent to a specific address.
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails.lock().await.iter().any(|e| e.to == email)
    }
}

#[async_trait]
impl EmailProvider for MockSmtpProvider {
    async fn send(&self, email: &OutgoingEmail) -> EmailResult<SendResult> {
        if self.should_fail {
            return Err(EmailError::Smtp("mock failure".into()));
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SendResult {
            message_id: format!("mock-{}", email.to),
        })
    }

    async fn health_check(&self) -> EmailResult<()> {
        if self.should_fail {
            return Err(EmailError::Smtp("mock health check failed".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_captures_sends() {
        let provider = MockSmtpProvider::new();
        let email = OutgoingEmail::new("test@example.com", "Subject", "<p>hi</p>");

        provider.send(&email).await.unwrap();

        assert_eq!(provider.sent_count().await, 1);
        assert!(provider.was_sent_to("test@example.com").await);
        assert!(!provider.was_sent_to("other@example.com").await);
    }

    #[tokio::test]
    async fn test_mock_provider_fails() {
        let provider = MockSmtpProvider::failing();
        let email = OutgoingEmail::new("test@example.com", "Subject", "<p>hi</p>");

        assert!(provider.send(&email).await.is_err());
        assert_eq!(provider.sent_count().await, 0);
    }
}
