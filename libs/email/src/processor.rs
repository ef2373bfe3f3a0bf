//! Bus-message processor: decodes requests and drives the provider.

use async_trait::async_trait;
use messaging::{ProcessingError, Processor, AUTH_TOPIC, DAILY_TOPIC};
use tracing::info;

use crate::error::EmailError;
use crate::images::{attachment_name, content_type_for, ImagePicker};
use crate::message::{AuthRequest, DailyRequest};
use crate::provider::{EmailProvider, InlineImage, OutgoingEmail};
use crate::templates::TemplateEngine;
use crate::{AUTH_SUBJECT, DAILY_SUBJECT};

/// Turns claimed bus messages into rendered SMTP sends.
pub struct MailProcessor<P> {
    provider: P,
    templates: TemplateEngine,
    images: ImagePicker,
    /// Resolved location of the user-handling HTTP proxy, embedded into
    /// confirmation links and the unsubscribe header.
    service_location: String,
}

impl<P: EmailProvider> MailProcessor<P> {
    pub fn new(
        provider: P,
        templates: TemplateEngine,
        images: ImagePicker,
        service_location: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            templates,
            images,
            service_location: service_location.into(),
        }
    }

    async fn handle_auth(&self, payload: &[u8]) -> Result<(), ProcessingError> {
        let request = AuthRequest::decode(payload)
            .map_err(|e| ProcessingError::Poison(e.to_string()))?;

        info!(
            method = %request.method,
            to = %request.email,
            "Connecting and sending an auth message"
        );

        let body = self
            .templates
            .render_auth(&request.method, &self.service_location, &request.key)
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;

        let email = OutgoingEmail::new(&request.email, AUTH_SUBJECT, body);
        self.provider
            .send(&email)
            .await
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;
        Ok(())
    }

    async fn handle_daily(&self, payload: &[u8]) -> Result<(), ProcessingError> {
        let request = DailyRequest::decode(payload)
            .map_err(|e| ProcessingError::Poison(e.to_string()))?;

        info!(to = %request.email, "Connecting and sending a daily message");

        let image = self.attach_random_image().await
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;
        let body = self
            .templates
            .render_daily(&request.nickname, &image.name)
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;

        let email = OutgoingEmail::new(&request.email, DAILY_SUBJECT, body)
            .with_inline_image(image)
            .with_list_unsubscribe(format!(
                "<{}/v1/unsubscribe/{}>",
                self.service_location, request.nickname
            ));

        self.provider
            .send(&email)
            .await
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;
        Ok(())
    }

    async fn attach_random_image(&self) -> Result<InlineImage, EmailError> {
        let path = self.images.pick()?;
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| EmailError::Image(format!("{}: {}", path.display(), e)))?;

        Ok(InlineImage {
            name: attachment_name(&path),
            content_type: content_type_for(&path).to_string(),
            content,
        })
    }
}

#[async_trait]
impl<P: EmailProvider + 'static> Processor for MailProcessor<P> {
    async fn process(&self, topic: &str, payload: &[u8]) -> Result<(), ProcessingError> {
        match topic {
            AUTH_TOPIC => self.handle_auth(payload).await,
            DAILY_TOPIC => self.handle_daily(payload).await,
            other => Err(ProcessingError::Poison(format!("unknown topic {:?}", other))),
        }
    }

    fn name(&self) -> &'static str {
        "mail_processor"
    }
}
