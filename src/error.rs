//! Connector error types.
//!
//! The protocol deliberately treats most device-side anomalies as
//! non-errors: a malformed frame is logged and discarded, a malformed
//! field degrades to a sentinel value, and an idle timeout is a liveness
//! signal rather than a failure. The variants here cover the remaining
//! genuinely fallible paths: configuration, transport, and the platform
//! collaborator.

use thiserror::Error;

/// Errors produced by the Santak RTU connector.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Platform API error (device lookup, heartbeat).
    #[error("Platform error: {0}")]
    Platform(String),

    /// MQTT publish error.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Device-facing transport error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        ConnectorError::Platform(err.to_string())
    }
}

impl From<toml::de::Error> for ConnectorError {
    fn from(err: toml::de::Error) -> Self {
        ConnectorError::Config(err.to_string())
    }
}

impl From<rumqttc::ClientError> for ConnectorError {
    fn from(err: rumqttc::ClientError) -> Self {
        ConnectorError::Publish(err.to_string())
    }
}
