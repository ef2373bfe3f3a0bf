//! Main-service location resolution.

use url::Url;

use crate::error::{EmailError, EmailResult};

/// Environment variable with the externally reachable IP of this host.
pub const HOST_IP_ENV: &str = "GWM_HOST_EXTERNAL_IP";

/// Resolve the URL the confirmation links point at.
///
/// A location starting with `localhost` is only reachable from inside the
/// deployment, so it is rewritten to `http://<external-ip><rest>` using
/// [`HOST_IP_ENV`]. Anything else must parse as an absolute URI.
pub fn resolve_main_service_location(location: &str) -> EmailResult<String> {
    if let Some(rest) = location.strip_prefix("localhost") {
        let ip = std::env::var(HOST_IP_ENV).map_err(|_| {
            EmailError::Config(format!(
                "main service runs on this host but {} is not set",
                HOST_IP_ENV
            ))
        })?;
        return Ok(format!("http://{}{}", ip, rest));
    }

    Url::parse(location)
        .map_err(|e| EmailError::Config(format!("invalid main service location: {}", e)))?;
    Ok(location.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_rewritten_with_external_ip() {
        temp_env::with_var(HOST_IP_ENV, Some("203.0.113.7"), || {
            let resolved = resolve_main_service_location("localhost:8081").unwrap();
            assert_eq!(resolved, "http://203.0.113.7:8081");
        });
    }

    #[test]
    fn test_localhost_without_external_ip_fails() {
        temp_env::with_var_unset(HOST_IP_ENV, || {
            let result = resolve_main_service_location("localhost:8081");
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains(HOST_IP_ENV));
        });
    }

    #[test]
    fn test_absolute_url_passes_through() {
        let resolved = resolve_main_service_location("https://melons.example.com").unwrap();
        assert_eq!(resolved, "https://melons.example.com");
    }

    #[test]
    fn test_relative_location_rejected() {
        assert!(resolve_main_service_location("not a url").is_err());
    }
}
