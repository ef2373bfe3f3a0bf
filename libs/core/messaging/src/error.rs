use thiserror::Error;

/// Errors surfaced by the bus plumbing.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to message broker: {0}")]
    ConnectFailed(String),

    #[error("failed to publish message: {0}")]
    PublishFailed(String),

    #[error("failed to consume messages: {0}")]
    ConsumeFailed(String),

    #[error("failed to set up stream: {0}")]
    StreamSetup(String),
}
