//! Email provider implementations.
//!
//! | Provider | Use case |
//! |----------|----------|
//! | [`SmtpProvider`] | Production SMTP relay (STARTTLS) |
//! | [`MockSmtpProvider`] | Testing |

use async_trait::async_trait;

use crate::error::EmailResult;

/// An image shipped inline with the message and referenced from the HTML
/// body by content id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    /// Content id and filename, e.g. `watermelon.jpg`.
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

/// A fully rendered message ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body_html: String,
    pub inline_image: Option<InlineImage>,
    pub list_unsubscribe: Option<String>,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body_html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body_html: body_html.into(),
            inline_image: None,
            list_unsubscribe: None,
        }
    }

    pub fn with_inline_image(mut self, image: InlineImage) -> Self {
        self.inline_image = Some(image);
        self
    }

    pub fn with_list_unsubscribe(mut self, target: impl Into<String>) -> Self {
        self.list_unsubscribe = Some(target.into());
        self
    }
}

/// Result of sending an email.
#[derive(Debug)]
pub struct SendResult {
    /// Transport-specific message id or response line.
    pub message_id: String,
}

/// Trait for email providers.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &OutgoingEmail) -> EmailResult<SendResult>;

    /// Check if the provider is healthy.
    async fn health_check(&self) -> EmailResult<()>;

    /// Get provider name.
    fn name(&self) -> &'static str;
}

pub mod mock;
pub mod smtp;

pub use mock::MockSmtpProvider;
pub use smtp::{SmtpConfig, SmtpProvider};
