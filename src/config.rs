//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Parsing goes through
//! [`ServerConfig::from_lookup`] so it can be exercised without touching
//! the process environment.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Error raised when a required setting cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `SERVER_HOST` is not an IP address.
    #[error("SERVER_HOST must be an IP address, got {0:?}")]
    InvalidHost(String),

    /// `SERVER_PORT` is not a valid port number.
    #[error("SERVER_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Which browser origins may call the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Any origin (development).
    Permissive,
    /// Only the listed origins.
    Origins(Vec<String>),
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Public base URL the service is reached at.
    pub public_url: String,

    /// Explicit CORS origins; `None` derives them from `public_url`.
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Bound of each guest connection's outbound queue.
    pub guest_queue_capacity: usize,

    /// Upper bound on a single WebSocket write.
    pub ws_send_timeout: Duration,

    /// Time between keepalive pings on a guest socket.
    pub ping_interval: Duration,

    /// How long a keepalive ping may stay unanswered.
    pub pong_timeout: Duration,

    /// Timeout applied to plain HTTP requests.
    pub request_timeout: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `SERVER_HOST` or `SERVER_PORT` is set
    /// but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Falls back to defaults for missing keys. Numeric tuning knobs also
    /// fall back on invalid values; the bind address does not.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `SERVER_HOST` or `SERVER_PORT` is set
    /// but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let host: IpAddr = host.parse().map_err(|_| ConfigError::InvalidHost(host))?;

        let port: u16 = match lookup("SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8000,
        };

        let public_url = lookup("PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").map(|raw| parse_list(&raw));

        let guest_queue_capacity = parse_or(&lookup, "GUEST_QUEUE_CAPACITY", 16);
        let ws_send_timeout = Duration::from_millis(parse_or(&lookup, "WS_SEND_TIMEOUT_MS", 5_000));
        let ping_interval =
            Duration::from_secs(parse_or::<u64, _>(&lookup, "PING_INTERVAL_SECS", 30).max(1));
        let pong_timeout =
            Duration::from_secs(parse_or::<u64, _>(&lookup, "PONG_TIMEOUT_SECS", 10).max(1));
        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30));

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr: SocketAddr::new(host, port),
            public_url,
            cors_allowed_origins,
            guest_queue_capacity,
            ws_send_timeout,
            ping_interval,
            pong_timeout,
            request_timeout,
            log_format,
        })
    }

    /// Returns `true` unless the public URL points at the local machine.
    #[must_use]
    pub fn is_production(&self) -> bool {
        let url = self.public_url.to_lowercase();
        !url.contains("localhost") && !url.contains("127.0.0.1")
    }

    /// Resolves the CORS policy.
    ///
    /// Explicit origins win. Otherwise development is permissive and
    /// production only admits the public URL's own origin.
    #[must_use]
    pub fn cors_policy(&self) -> CorsPolicy {
        if let Some(origins) = &self.cors_allowed_origins {
            return CorsPolicy::Origins(origins.clone());
        }
        if self.is_production() {
            CorsPolicy::Origins(vec![origin_of(&self.public_url)])
        } else {
            CorsPolicy::Permissive
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Splits a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// `scheme://host[:port]` part of a URL.
fn origin_of(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let authority = rest.split('/').next().unwrap_or(rest);
            format!("{scheme}://{authority}")
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = assert_ok!(config_from(&[]));
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(config.public_url, "http://localhost:8000");
        assert_eq!(config.guest_queue_capacity, 16);
        assert_eq!(config.ws_send_timeout, Duration::from_millis(5_000));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.pong_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(!config.is_production());
        assert_eq!(config.cors_policy(), CorsPolicy::Permissive);
    }

    #[test]
    fn host_and_port_are_combined() {
        let config = assert_ok!(config_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9100"),
        ]));
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:9100");
        assert_eq!(config.public_url, "http://localhost:9100");
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let host = assert_err!(config_from(&[("SERVER_HOST", "not-an-ip")]));
        assert_eq!(host, ConfigError::InvalidHost("not-an-ip".to_string()));

        let port = assert_err!(config_from(&[("SERVER_PORT", "70000")]));
        assert_eq!(port, ConfigError::InvalidPort("70000".to_string()));
    }

    #[test]
    fn invalid_tuning_values_fall_back() {
        let config = assert_ok!(config_from(&[
            ("GUEST_QUEUE_CAPACITY", "lots"),
            ("WS_SEND_TIMEOUT_MS", "-1"),
        ]));
        assert_eq!(config.guest_queue_capacity, 16);
        assert_eq!(config.ws_send_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn keepalive_timings_are_configurable() {
        let config = assert_ok!(config_from(&[
            ("PING_INTERVAL_SECS", "5"),
            ("PONG_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.pong_timeout, Duration::from_secs(1));
    }

    #[test]
    fn public_host_means_production_origin_only() {
        let config = assert_ok!(config_from(&[(
            "PUBLIC_URL",
            "https://photos.example.org/app/"
        )]));
        assert!(config.is_production());
        assert_eq!(
            config.cors_policy(),
            CorsPolicy::Origins(vec!["https://photos.example.org".to_string()])
        );
    }

    #[test]
    fn explicit_origins_override_derivation() {
        let config = assert_ok!(config_from(&[
            ("PUBLIC_URL", "https://photos.example.org"),
            (
                "CORS_ALLOWED_ORIGINS",
                "https://a.example.org, ,https://www.a.example.org"
            ),
        ]));
        assert_eq!(
            config.cors_policy(),
            CorsPolicy::Origins(vec![
                "https://a.example.org".to_string(),
                "https://www.a.example.org".to_string(),
            ])
        );
    }

    #[test]
    fn json_log_format_is_recognised() {
        let config = assert_ok!(config_from(&[("LOG_FORMAT", "json")]));
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
