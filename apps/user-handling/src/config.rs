//! Service-specific configuration: delivery schedule and optional TLS.

use std::time::Duration;

use core_config::{env_or_default, ConfigError, FromEnv};
use regex::Regex;

const DELIVERY_TIME_ENV: &str = "GWM_DELIVERY_TIME";
const DELIVERY_INTERVAL_ENV: &str = "GWM_DELIVERY_INTERVAL";

/// When and how often the daily fan-out fires.
///
/// Immutable after startup; the scheduler receives it by value. Defaults to
/// `12:00:00` local time every 24 hours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            hour: 12,
            minute: 0,
            second: 0,
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl FromEnv for DeliveryConfig {
    /// Optional overrides:
    /// - `GWM_DELIVERY_TIME` — `HH:MM:SS`, validated before use;
    /// - `GWM_DELIVERY_INTERVAL` — a duration literal such as `24h` or
    ///   `10h20m30s`.
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let time = env_or_default(DELIVERY_TIME_ENV, "");
        if !time.is_empty() {
            let pattern = Regex::new(r"^([0-1]?\d|2[0-3]):[0-5]\d:[0-5]\d$")
                .expect("delivery time pattern is valid");
            if !pattern.is_match(&time) {
                return Err(ConfigError::ParseError {
                    key: DELIVERY_TIME_ENV.to_string(),
                    details: format!("{:?} doesn't match the HH:MM:SS pattern", time),
                });
            }
            let mut parts = time.split(':').map(|part| {
                part.parse::<u32>().expect("pattern guarantees digits")
            });
            config.hour = parts.next().expect("pattern guarantees three parts");
            config.minute = parts.next().expect("pattern guarantees three parts");
            config.second = parts.next().expect("pattern guarantees three parts");
        }

        let interval = env_or_default(DELIVERY_INTERVAL_ENV, "");
        if !interval.is_empty() {
            config.interval =
                humantime::parse_duration(&interval).map_err(|e| ConfigError::ParseError {
                    key: DELIVERY_INTERVAL_ENV.to_string(),
                    details: e.to_string(),
                })?;
        }

        Ok(config)
    }
}

/// Optional mutual-TLS material for the gRPC listener.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: String,
    pub key_path: String,
    pub ca_path: String,
}

impl FromEnv for TlsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let enabled = matches!(env_or_default("GWM_TLS", "false").as_str(), "true" | "1");
        Ok(Self {
            enabled,
            cert_path: env_or_default("GWM_TLS_CERT", "./cert/cert.pem"),
            key_path: env_or_default("GWM_TLS_KEY", "./cert/key.pem"),
            ca_path: env_or_default("GWM_TLS_CA", "./cert/ca-cert.pem"),
        })
    }
}
