//! Email delivery library for the watermelon service.
//!
//! The email worker claims requests from the bus and turns them into SMTP
//! sends:
//!
//! ```text
//! auth / daily topics
//!   ↓ (messaging::Worker, `emailsend` consumer group)
//! MailProcessor
//!   ↓ (renders templates, picks the day's photo)
//! EmailProvider (SMTP / mock)
//!   ↓
//! Subscriber inbox
//! ```
//!
//! Providers sit behind the [`EmailProvider`] trait so tests can capture
//! sends with [`MockSmtpProvider`] instead of talking to a relay.

pub mod error;
pub mod images;
pub mod location;
pub mod message;
pub mod processor;
pub mod provider;
pub mod templates;

pub use error::{EmailError, EmailResult};
pub use images::ImagePicker;
pub use location::resolve_main_service_location;
pub use message::{AuthRequest, DailyRequest};
pub use processor::MailProcessor;
pub use provider::{EmailProvider, InlineImage, MockSmtpProvider, OutgoingEmail, SendResult, SmtpConfig, SmtpProvider};
pub use templates::TemplateEngine;

/// Maximum number of SMTP connections open at once.
pub const MAX_CONNS: usize = 10;

/// Subject line of confirmation emails.
pub const AUTH_SUBJECT: &str = "Confirm action";

/// Subject line of daily delivery emails.
pub const DAILY_SUBJECT: &str = "Daily watermelon";

/// Base name of the attached photo; the extension follows the chosen file.
pub const ATTACHMENT_BASE_NAME: &str = "watermelon";
