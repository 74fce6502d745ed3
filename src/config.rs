//! Configuration for the demo binary.
//!
//! Loads the plain HTTP listener, the HTTPS proxy settings and the logging
//! format from a TOML file. `AppConfig` is the root struct; every section is
//! optional and falls back to the defaults below.

use serde::Deserialize;
use std::path::Path;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "local_https_proxy=debug,tower_http=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Environment variable selecting the application environment
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Environment name for which the HTTPS proxy is started
pub const LOCAL_APP_ENV: &str = "local";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Plain HTTP server for the application itself
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Local HTTPS proxy
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }
}

/// HTTPS proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// HTTPS port (default: 3443)
    #[serde(default = "ProxyConfig::default_port")]
    pub port: u16,
    #[serde(default = "ProxyConfig::default_host")]
    pub host: String,
    /// PEM certificate path
    #[serde(default = "ProxyConfig::default_cert_path")]
    pub cert_path: String,
    /// PEM private key path
    #[serde(default = "ProxyConfig::default_key_path")]
    pub key_path: String,
    /// Overrides the APP_ENV environment variable when set
    pub app_env: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: Self::default_port(),
            host: Self::default_host(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            app_env: None,
        }
    }
}

impl ProxyConfig {
    fn default_port() -> u16 {
        3443
    }

    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_cert_path() -> String {
        "certificate/cert.pem".to_string()
    }

    fn default_key_path() -> String {
        "certificate/key.pem".to_string()
    }

    /// Whether the proxy should run, given the process's APP_ENV value.
    pub fn enabled(&self, env_app_env: Option<&str>) -> bool {
        self.app_env
            .as_deref()
            .or(env_app_env)
            .is_some_and(|env| env.eq_ignore_ascii_case(LOCAL_APP_ENV))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }
}

impl AppConfig {
    /// Load from `path`. A missing file at the default path yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;

        if config.http.port != 0 && config.http.port == config.proxy.port {
            return Err(ConfigError::Validation(format!(
                "http.port and proxy.port must differ (both are {})",
                config.http.port
            )));
        }

        match config.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "Unknown logging.format '{}', expected \"text\" or \"json\"",
                    other
                )))
            }
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
