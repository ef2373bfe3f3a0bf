//! Message-bus plumbing shared by the watermelon delivery services.
//!
//! Three logical topics flow over the bus:
//!
//! - `auth` — confirmation email requests, value `"<email> <key> <method>"`;
//! - `daily` — daily photo requests, value `"<email> <nickname>"`;
//! - `logs` — one JSON log line per message, fanned out by [`BusLogWriter`].
//!
//! The user-handling service publishes through [`BusPublisher`]; the email
//! service consumes through [`Worker`], which joins the `emailsend` durable
//! consumer on `auth` and `daily` and dispatches handlers under a fixed
//! admission semaphore.

pub mod connect;
pub mod consumer;
pub mod error;
pub mod log_writer;
pub mod publisher;

pub use connect::{connect, connect_with_retry, ensure_streams};
pub use consumer::{Dispatcher, ProcessingError, Processor, Worker};
pub use error::BusError;
pub use log_writer::BusLogWriter;
pub use publisher::{BusPublisher, Publisher};

/// Topic carrying confirmation email requests.
pub const AUTH_TOPIC: &str = "auth";

/// Topic carrying daily delivery requests.
pub const DAILY_TOPIC: &str = "daily";

/// Topic receiving the structured log stream.
pub const LOGS_TOPIC: &str = "logs";

/// Durable consumer group joined by the email service.
pub const CONSUMER_GROUP: &str = "emailsend";
