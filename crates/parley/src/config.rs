use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley_transport::{TransportConfig, TransportError};
use parley_types::RetryPolicy;
use serde::Deserialize;
use std::path::Path;

const ACCESS_TOKEN_VAR: &str = "PARLEY_ACCESS_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub transport: TransportSection,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secret (from ENV only)
    #[serde(skip)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSection {
    pub http_url: String,
    /// Derived from `http_url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// `json` or `pretty`
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (ENV defaults to `dev`)
    /// 3. `PARLEY_` environment variables, `__` between sections
    ///    (`PARLEY_TRANSPORT__HTTP_URL`)
    ///
    /// A `.env` file is read first if present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Signed out when unset
        cfg.access_token = std::env::var(ACCESS_TOKEN_VAR)
            .ok()
            .filter(|token| !token.is_empty());

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }

    /// Endpoints and tuning for the transport link, validated
    pub fn transport_config(&self) -> Result<TransportConfig, TransportError> {
        let section = &self.transport;
        let mut transport = match &section.ws_url {
            Some(ws_url) => TransportConfig::new(section.http_url.clone(), ws_url.clone()),
            None => TransportConfig::from_http_url(section.http_url.clone())?,
        };
        if let Some(timeout_ms) = section.connect_timeout_ms {
            transport.connect_timeout_ms = timeout_ms;
        }
        transport.retry = self.retry.clone();

        transport.validate()?;
        Ok(transport)
    }
}
