//! Platform collaborator: device lookup, telemetry and status publishing.
//!
//! The connector consumes a narrow interface from the IoT platform:
//! resolve a credential to a device identity, invalidate a cached
//! credential, and publish telemetry/status. [`PlatformGateway`]
//! captures that interface so the transport layer can be driven by a
//! mock in tests; [`PlatformClient`] is the production implementation
//! speaking HTTP (lookup, heartbeat) and MQTT (publishes).
//!
//! The credential→identity cache inside the client is the only state
//! shared across device connections. Every successful resolution must
//! be matched by an invalidation when the owning session terminates, so
//! a reconnecting device never observes a stale identity.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::codec::TelemetryBundle;
use crate::config::PlatformConfig;
use crate::error::{ConnectorError, Result};

/// MQTT topic for telemetry envelopes.
const TELEMETRY_TOPIC: &str = "devices/telemetry";

/// MQTT topic prefix for per-device status updates.
const STATUS_TOPIC_PREFIX: &str = "devices/status/";

/// Device identity as returned by the platform lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Platform-assigned device identifier.
    #[serde(default)]
    pub id: String,
    /// Human-facing device number.
    #[serde(default)]
    pub device_number: String,
}

/// The interface the connector consumes from the platform.
///
/// Futures are `Send` so generic connection tasks can be spawned onto
/// the multi-threaded runtime.
pub trait PlatformGateway: Send + Sync + 'static {
    /// Resolve a credential to a device identity, or `None` if the
    /// platform does not know it.
    fn resolve_device(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Option<DeviceIdentity>>> + Send;

    /// Drop any cached identity for this credential. Idempotent.
    fn invalidate_credential(&self, credential: &str) -> impl Future<Output = ()> + Send;

    /// Publish an online/offline status for a device. Best-effort.
    fn publish_status(&self, device_id: &str, online: bool)
        -> impl Future<Output = Result<()>> + Send;

    /// Publish one telemetry bundle for a device. Best-effort.
    fn publish_telemetry(
        &self,
        device_id: &str,
        bundle: &TelemetryBundle,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Serialize)]
struct DeviceConfigRequest<'a> {
    voucher: &'a str,
}

#[derive(Deserialize)]
struct DeviceConfigResponse {
    code: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: DeviceIdentity,
}

#[derive(Serialize)]
struct HeartbeatRequest<'a> {
    service_identifier: &'a str,
}

#[derive(Deserialize)]
struct HeartbeatResponse {
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct TelemetryEnvelope<'a> {
    device_id: &'a str,
    /// Base64-encoded JSON of the decoded values.
    values: String,
}

/// Production platform client: HTTP lookups plus MQTT publishing, with
/// a shared credential→identity cache.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    mqtt: AsyncClient,
    cache: RwLock<HashMap<String, DeviceIdentity>>,
}

impl PlatformClient {
    /// Connect to the platform MQTT broker and build the HTTP client.
    ///
    /// Returns the client together with the MQTT event loop, which the
    /// caller must keep polling for the publishes to make progress.
    pub fn connect(config: &PlatformConfig) -> Result<(Self, EventLoop)> {
        let (host, port) = config.broker_host_port()?;
        let client_id = format!(
            "SANTAK-RTU-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        );
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        if !config.mqtt_username.is_empty() {
            options.set_credentials(config.mqtt_username.clone(), config.mqtt_password.clone());
        }
        let (mqtt, event_loop) = AsyncClient::new(options, 100);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok((
            Self {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                mqtt,
                cache: RwLock::new(HashMap::new()),
            },
            event_loop,
        ))
    }

    /// Find a cached device by its platform identifier.
    ///
    /// Used by the HTTP disconnect handler, which only knows the device
    /// id; returns the credential the identity was cached under.
    pub async fn device_by_id(&self, device_id: &str) -> Option<(String, DeviceIdentity)> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .find(|(_, device)| device.id == device_id)
            .map(|(credential, device)| (credential.clone(), device.clone()))
    }

    /// Send a plugin heartbeat to the platform.
    pub async fn send_heartbeat(&self, service_identifier: &str) -> Result<()> {
        let url = format!("{}/api/v1/plugin/heartbeat", self.base_url);
        let response: HeartbeatResponse = self
            .http
            .post(&url)
            .json(&HeartbeatRequest { service_identifier })
            .send()
            .await?
            .json()
            .await?;
        if response.code != 200 {
            return Err(ConnectorError::Platform(format!(
                "heartbeat rejected: code={}, message={}",
                response.code, response.message
            )));
        }
        Ok(())
    }
}

impl PlatformGateway for PlatformClient {
    async fn resolve_device(&self, credential: &str) -> Result<Option<DeviceIdentity>> {
        {
            let cache = self.cache.read().await;
            if let Some(device) = cache.get(credential) {
                return Ok(Some(device.clone()));
            }
        }

        let url = format!("{}/api/v1/plugin/device/config", self.base_url);
        let response: DeviceConfigResponse = self
            .http
            .post(&url)
            .json(&DeviceConfigRequest { voucher: credential })
            .send()
            .await?
            .json()
            .await?;

        if response.code != 200 || response.data.id.is_empty() {
            tracing::info!(
                code = response.code,
                message = %response.message,
                "device lookup returned no identity"
            );
            return Ok(None);
        }

        let device = response.data;
        self.cache
            .write()
            .await
            .insert(credential.to_string(), device.clone());
        Ok(Some(device))
    }

    async fn invalidate_credential(&self, credential: &str) {
        if self.cache.write().await.remove(credential).is_some() {
            tracing::debug!("credential cache entry cleared");
        }
    }

    async fn publish_status(&self, device_id: &str, online: bool) -> Result<()> {
        let topic = format!("{STATUS_TOPIC_PREFIX}{device_id}");
        let payload = if online { "1" } else { "0" };
        self.mqtt
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn publish_telemetry(&self, device_id: &str, bundle: &TelemetryBundle) -> Result<()> {
        let values = serde_json::to_vec(bundle)?;
        let envelope = TelemetryEnvelope {
            device_id,
            values: BASE64.encode(values),
        };
        let payload = serde_json::to_vec(&envelope)?;
        self.mqtt
            .publish(TELEMETRY_TOPIC, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_envelope_encodes_values_as_base64() {
        let mut bundle = TelemetryBundle::new();
        bundle.insert("loadpower", crate::codec::FieldValue::Number(100.0));

        let values = serde_json::to_vec(&bundle).unwrap();
        let envelope = TelemetryEnvelope {
            device_id: "dev-1",
            values: BASE64.encode(&values),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["device_id"], "dev-1");

        let decoded = BASE64.decode(json["values"].as_str().unwrap()).unwrap();
        let inner: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(inner["loadpower"], 100.0);
    }

    #[test]
    fn test_device_identity_deserializes_with_missing_fields() {
        let device: DeviceIdentity = serde_json::from_str("{\"id\":\"dev-1\"}").unwrap();
        assert_eq!(device.id, "dev-1");
        assert!(device.device_number.is_empty());
    }
}
