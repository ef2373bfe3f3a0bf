use crate::{env_or_default, ConfigError, FromEnv};

/// Message broker configuration.
///
/// `GWM_BROKERS_ADDRESSES` takes a comma-separated server list, matching the
/// broker client's multi-server connect syntax.
#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub servers: String,
}

impl NatsConfig {
    pub fn new(servers: impl Into<String>) -> Self {
        Self {
            servers: servers.into(),
        }
    }
}

impl FromEnv for NatsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            servers: env_or_default("GWM_BROKERS_ADDRESSES", "nats://nats:4222"),
        })
    }
}
