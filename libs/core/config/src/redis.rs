use crate::{env_or_default, ConfigError, FromEnv};

/// Redis cache configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl FromEnv for RedisConfig {
    /// Reads GWM_REDIS_ADDRESS, defaulting to the compose-network address.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("GWM_REDIS_ADDRESS", "redis://redis:6379"),
        })
    }
}
