//! HTTP request handlers for the plugin API.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::state::AppState;
use crate::platform::PlatformGateway;

/// Protocol type this plugin serves.
const PROTOCOL_TYPE: &str = "SANTAK-RTU";

/// Device type this plugin serves (direct-connect device).
const DEVICE_TYPE: &str = "1";

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/form/config", post(form_config))
        .route("/api/v1/device/disconnect", post(device_disconnect))
        .route("/api/v1/plugin/notify", post(notification))
        .route("/api/v1/plugin/device/list", post(device_list))
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the process is serving.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Seconds since startup.
    pub uptime_secs: u64,
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
    })
}

/// Form config request
#[derive(Deserialize)]
pub struct FormConfigRequest {
    /// Requesting protocol type; must match [`PROTOCOL_TYPE`].
    pub protocol_type: String,
    /// Requesting device type; must match [`DEVICE_TYPE`].
    pub device_type: String,
    /// Which form to return: CFG, VCR, VCRT or SVCR.
    pub form_type: String,
}

/// Form config endpoint.
///
/// Returns the credential form the platform renders when a Santak
/// device is onboarded. The voucher form has a single field: the raw
/// registration package the UPS sends on connect.
async fn form_config(Json(req): Json<FormConfigRequest>) -> impl IntoResponse {
    tracing::info!(
        protocol_type = %req.protocol_type,
        device_type = %req.device_type,
        form_type = %req.form_type,
        "form config requested"
    );

    if req.protocol_type != PROTOCOL_TYPE || req.device_type != DEVICE_TYPE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": 400,
                "message": format!(
                    "unsupported protocol/device type: {},{}",
                    req.protocol_type, req.device_type
                ),
            })),
        );
    }

    let form = match req.form_type.as_str() {
        "VCR" | "VCRT" => voucher_form(),
        "CFG" | "SVCR" => Value::Null,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "code": 400,
                    "message": format!("unsupported form type: {other}"),
                })),
            );
        }
    };

    (StatusCode::OK, Json(json!({ "code": 200, "data": form })))
}

/// Voucher form definition rendered by the platform.
fn voucher_form() -> Value {
    json!([
        {
            "dataKey": "santak_reg_pkg",
            "label": "Registration package",
            "placeholder": "Raw registration payload sent by the UPS",
            "type": "input",
            "validate": { "required": true, "type": "string" }
        }
    ])
}

/// Device disconnect request
#[derive(Deserialize)]
pub struct DeviceDisconnectRequest {
    /// Platform device identifier to disconnect.
    pub device_id: String,
}

/// Device disconnect endpoint.
///
/// The cache is keyed by credential, so the device has to be found by
/// id first before its entry can be cleared.
async fn device_disconnect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceDisconnectRequest>,
) -> impl IntoResponse {
    tracing::info!(device_id = %req.device_id, "device disconnect requested");

    if let Some((credential, _)) = state.platform.device_by_id(&req.device_id).await {
        state.platform.invalidate_credential(&credential).await;
    }

    if let Err(err) = state.platform.publish_status(&req.device_id, false).await {
        tracing::error!(device_id = %req.device_id, %err, "failed to publish offline status");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": 500, "message": err.to_string() })),
        );
    }

    (StatusCode::OK, Json(json!({ "code": 200, "message": "ok" })))
}

/// Device list request
#[derive(Deserialize)]
pub struct DeviceListRequest {
    /// Service-level voucher (JSON) the platform configured for this plugin.
    pub voucher: String,
    /// Identifier of the requesting service.
    #[serde(default)]
    pub service_identifier: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// Device list endpoint.
///
/// Santak devices self-register over TCP rather than being discovered,
/// so there is no list to report: a valid voucher gets an empty page.
async fn device_list(Json(req): Json<DeviceListRequest>) -> impl IntoResponse {
    tracing::info!(
        service_identifier = %req.service_identifier,
        page = req.page,
        page_size = req.page_size,
        "device list requested"
    );

    if serde_json::from_str::<Value>(&req.voucher).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 400, "message": "invalid voucher" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "code": 200,
            "message": "ok",
            "data": { "list": [], "total": 0 },
        })),
    )
}

/// Notification request
#[derive(Deserialize)]
pub struct NotificationRequest {
    /// "1" for service config changes, "2" for device config changes.
    pub message_type: String,
    /// Opaque JSON message body.
    #[serde(default)]
    pub message: String,
}

/// Notification endpoint; config changes are logged and acknowledged.
async fn notification(Json(req): Json<NotificationRequest>) -> impl IntoResponse {
    match req.message_type.as_str() {
        "1" => tracing::info!(message = %req.message, "service config change notification"),
        "2" => tracing::info!(message = %req.message, "device config change notification"),
        other => tracing::warn!(message_type = other, "unknown notification type"),
    }
    (StatusCode::OK, Json(json!({ "code": 200, "message": "ok" })))
}
