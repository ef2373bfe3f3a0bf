use crate::{env_or_default, ConfigError, FromEnv};
use std::net::Ipv4Addr;

/// gRPC server bind configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromEnv for ServerConfig {
    /// Reads from environment variables with sensible defaults:
    /// - GRPC_HOST: defaults to 0.0.0.0 (all interfaces)
    /// - GRPC_PORT: defaults to 9090
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("GRPC_HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_or_default("GRPC_PORT", "9090")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "GRPC_PORT".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self { host, port })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 9090,
        }
    }
}
