use thiserror::Error;

/// Result type for email operations.
pub type EmailResult<T> = Result<T, EmailError>;

/// Errors that can occur while preparing or sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Bad configuration (email-info file, service location, image directory).
    #[error("configuration error: {0}")]
    Config(String),

    /// A bus payload could not be decoded into a request.
    #[error("malformed request: {0}")]
    Decode(String),

    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(String),

    /// No usable image could be selected or read.
    #[error("image error: {0}")]
    Image(String),

    /// The SMTP transport rejected or failed the send.
    #[error("smtp error: {0}")]
    Smtp(String),
}
