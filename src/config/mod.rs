//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - `SANTAK_`-prefixed environment variables

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Platform endpoints and credentials
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConnectorError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| ConnectorError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment variable overrides on top of this config
    pub fn apply_env(mut self) -> Self {
        if let Ok(port) = std::env::var("SANTAK_SERVER_TCP_PORT") {
            if let Ok(port) = port.parse() {
                self.server.tcp_port = port;
            }
        }
        if let Ok(port) = std::env::var("SANTAK_SERVER_HTTP_PORT") {
            if let Ok(port) = port.parse() {
                self.server.http_port = port;
            }
        }
        if let Ok(url) = std::env::var("SANTAK_PLATFORM_BASE_URL") {
            self.platform.base_url = url;
        }
        if let Ok(broker) = std::env::var("SANTAK_PLATFORM_MQTT_BROKER") {
            self.platform.mqtt_broker = broker;
        }
        if let Ok(username) = std::env::var("SANTAK_PLATFORM_MQTT_USERNAME") {
            self.platform.mqtt_username = username;
        }
        if let Ok(password) = std::env::var("SANTAK_PLATFORM_MQTT_PASSWORD") {
            self.platform.mqtt_password = password;
        }
        if let Ok(level) = std::env::var("SANTAK_LOG_LEVEL") {
            self.log.level = level;
        }
        self
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Device-facing TCP port
    pub tcp_port: u16,

    /// Plugin management HTTP port
    pub http_port: u16,

    /// Host to bind both listeners to
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_port: 5005,
            http_port: 8505,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl ServerConfig {
    /// Device-facing TCP listen address
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    /// Plugin HTTP listen address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

/// Platform endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform HTTP API base URL
    pub base_url: String,

    /// MQTT broker address, `host:port`
    pub mqtt_broker: String,

    /// MQTT username (empty disables authentication)
    #[serde(default)]
    pub mqtt_username: String,

    /// MQTT password
    #[serde(default)]
    pub mqtt_password: String,

    /// Service identifier sent with plugin heartbeats
    #[serde(default = "default_service_identifier")]
    pub service_identifier: String,
}

fn default_service_identifier() -> String {
    "SANTAK-RTU".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9999".to_string(),
            mqtt_broker: "127.0.0.1:1883".to_string(),
            mqtt_username: String::new(),
            mqtt_password: String::new(),
            service_identifier: default_service_identifier(),
        }
    }
}

impl PlatformConfig {
    /// Split the broker address into host and port.
    ///
    /// Accepts a bare `host:port` or a `tcp://`/`mqtt://` prefix.
    pub fn broker_host_port(&self) -> Result<(String, u16)> {
        let addr = self
            .mqtt_broker
            .trim_start_matches("tcp://")
            .trim_start_matches("mqtt://");
        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    ConnectorError::Config(format!("invalid MQTT broker port in '{addr}'"))
                })?;
                Ok((host.to_string(), port))
            }
            None => Ok((addr.to_string(), 1883)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
