//! SMTP email provider using lettre.

use std::path::Path;

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Attachment, Body, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{EmailProvider, OutgoingEmail, SendResult};
use crate::error::{EmailError, EmailResult};

/// The four SMTP fields the email-info file must carry.
const EMAIL_INFO_FIELDS: usize = 4;

/// SMTP provider configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

impl SmtpConfig {
    /// Parse the email-info CSV: a header row naming any arrangement of
    /// `Host`, `Port`, `Username`, `Password`, and a value row beneath it.
    /// All four fields must be present, unrecognized columns are ignored.
    pub fn from_csv_file(path: impl AsRef<Path>) -> EmailResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EmailError::Config(format!("{}: {}", path.display(), e)))?;

        let mut lines = contents.lines();
        let header = lines
            .next()
            .ok_or_else(|| EmailError::Config(format!("{}: missing header row", path.display())))?;
        let values = lines
            .next()
            .ok_or_else(|| EmailError::Config(format!("{}: missing value row", path.display())))?;

        let header: Vec<&str> = header.split(',').map(str::trim).collect();
        let values: Vec<&str> = values.split(',').map(str::trim).collect();
        if header.len() != values.len() {
            return Err(EmailError::Config(format!(
                "{}: header has {} columns but value row has {}",
                path.display(),
                header.len(),
                values.len()
            )));
        }

        let mut config = Self::default();
        let mut recognized = 0;
        for (name, value) in header.iter().zip(&values) {
            recognized += 1;
            match *name {
                "Host" => config.host = value.to_string(),
                "Port" => {
                    config.port = value.parse().map_err(|e| {
                        EmailError::Config(format!("{}: invalid Port: {}", path.display(), e))
                    })?;
                }
                "Username" => config.username = value.to_string(),
                "Password" => config.password = value.to_string(),
                _ => recognized -= 1,
            }
        }
        if recognized != EMAIL_INFO_FIELDS {
            return Err(EmailError::Config(format!(
                "invalid file {}: expected {} fields of info to parse, got {}",
                path.display(),
                EMAIL_INFO_FIELDS,
                recognized
            )));
        }

        config.from_email = config.username.clone();
        Ok(config)
    }

    /// Read SMTP settings from the environment (`SMTP_HOST`, `SMTP_PORT`,
    /// `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM_ADDRESS`).
    pub fn from_env() -> EmailResult<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| EmailError::Config("SMTP_HOST not set".into()))?;
        let port = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .map_err(|e| EmailError::Config(format!("invalid SMTP_PORT: {}", e)))?;
        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_email = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Self {
            host,
            port,
            username,
            password,
            from_email,
        })
    }
}

/// `List-Unsubscribe` is not among lettre's typed headers.
#[derive(Clone)]
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// SMTP email provider.
///
/// Sends over STARTTLS when credentials are configured; falls back to a
/// plain connection for local relays like Mailpit.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> EmailResult<Self> {
        let transport = if config.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| EmailError::Smtp(e.to_string()))?
                .credentials(creds)
                .port(config.port)
                .build()
        };

        Ok(Self { transport, config })
    }

    fn build_message(&self, email: &OutgoingEmail) -> EmailResult<Message> {
        let from: Mailbox = self
            .config
            .from_email
            .parse()
            .map_err(|e| EmailError::Smtp(format!("invalid from address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError::Smtp(format!("invalid to address: {}", e)))?;

        let mut builder = Message::builder().from(from).to(to).subject(&email.subject);

        if let Some(target) = &email.list_unsubscribe {
            builder = builder.header(ListUnsubscribe(target.clone()));
        }

        let message = match &email.inline_image {
            Some(image) => {
                let content_type = ContentType::parse(&image.content_type)
                    .map_err(|e| EmailError::Smtp(format!("invalid content type: {}", e)))?;
                let image_part = Attachment::new_inline(image.name.clone())
                    .body(Body::new(image.content.clone()), content_type);

                builder
                    .multipart(
                        MultiPart::related()
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_HTML)
                                    .body(email.body_html.clone()),
                            )
                            .singlepart(image_part),
                    )
                    .map_err(|e| EmailError::Smtp(e.to_string()))?
            }
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.body_html.clone())
                .map_err(|e| EmailError::Smtp(e.to_string()))?,
        };

        Ok(message)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &OutgoingEmail) -> EmailResult<SendResult> {
        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| EmailError::Smtp(e.to_string()))?;

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or_default();

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email sent successfully"
        );

        Ok(SendResult { message_id })
    }

    async fn health_check(&self) -> EmailResult<()> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| EmailError::Smtp(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
