// Endpoints and connection tuning for both channels

use parley_types::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{Result, TransportError};

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// GraphQL endpoint for queries and mutations (http/https)
    pub http_url: String,
    /// GraphQL endpoint for subscriptions (ws/wss)
    pub ws_url: String,
    /// Upper bound for websocket handshake plus `connection_ack`
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl TransportConfig {
    pub fn new(http_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            http_url: http_url.into(),
            ws_url: ws_url.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }

    /// Derive the websocket endpoint from the HTTP one (`https` → `wss`)
    pub fn from_http_url(http_url: impl Into<String>) -> Result<Self> {
        let http_url = http_url.into();
        let mut ws = Url::parse(&http_url)
            .map_err(|e| TransportError::Config(format!("Invalid http_url '{}': {}", http_url, e)))?;

        let scheme = match ws.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(TransportError::Config(format!(
                    "Unsupported http_url scheme '{}'",
                    other
                )))
            }
        };
        ws.set_scheme(scheme)
            .map_err(|_| TransportError::Config(format!("Cannot derive ws url from '{}'", http_url)))?;

        Ok(Self::new(http_url, ws.to_string()))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        check_scheme("http_url", &self.http_url, &["http", "https"])?;
        check_scheme("ws_url", &self.ws_url, &["ws", "wss"])?;
        Ok(())
    }
}

fn check_scheme(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| TransportError::Config(format!("Invalid {} '{}': {}", field, value, e)))?;

    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(TransportError::Config(format!(
            "{} must use one of {:?}, got '{}'",
            field,
            allowed,
            url.scheme()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_ws_url() {
        let config = TransportConfig::from_http_url("https://app.example.com/v1/graphql").unwrap();
        assert_eq!(config.ws_url, "wss://app.example.com/v1/graphql");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_schemes() {
        let config = TransportConfig::new("ws://localhost/graphql", "ws://localhost/graphql");
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));

        let config = TransportConfig::new("http://localhost/graphql", "http://localhost/graphql");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{"http_url": "http://localhost:8080/v1/graphql", "ws_url": "ws://localhost:8080/v1/graphql"}"#;
        let config: TransportConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
