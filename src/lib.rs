//! # Santak RTU Connector
//!
//! Device-facing TCP connector for Santak UPS hardware speaking the
//! vendor WA/Q6 polling protocol, republishing decoded telemetry and
//! online/offline status to an IoT platform.
//!
//! ## Architecture
//!
//! ```text
//! UPS devices                 Connector                    Platform
//!     |                           |                            |
//!     |== TCP (one conn each) ==> | transport::TcpServer       |
//!     |                           |   one task per connection  |
//!     |                           |   protocol::Session        |
//!     |                           |   codec (frames, fields)   |
//!     |                           | platform::PlatformClient ==|==> HTTP lookup
//!     |                           |                            |==> MQTT publish
//!     |                           | server (plugin HTTP API) <=|=== form/disconnect
//! ```
//!
//! ## Protocol
//!
//! A device opens a TCP connection and sends a free-form registration
//! payload. The connector wraps it into a credential envelope, resolves
//! it against the platform, and on success replies `WA\r`. From then on
//! the connector alternates `WA\r`/`Q6\r` polls; the device answers each
//! with one fixed-position frame (13 tokens for WA, 20 for Q6) that is
//! decoded into a telemetry bundle and published. Ten seconds of
//! silence mark the device offline and close the connection.
//!
//! Decoding is best-effort throughout: a frame with the wrong token
//! count is discarded without breaking the poll cycle, and a malformed
//! field degrades to a placeholder value without suppressing the rest
//! of the bundle.
//!
//! ## Modules
//!
//! - [`codec`]: frame tokenization, field decoding, telemetry mapping
//! - [`protocol`]: the per-connection session state machine
//! - [`transport`]: TCP listener and per-connection supervisor tasks
//! - [`platform`]: platform gateway trait and HTTP/MQTT client
//! - [`server`]: plugin management HTTP API (Axum-based)
//! - [`config`]: configuration management
//! - [`error`]: error types and result alias

pub mod codec;
pub mod config;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use codec::{
    bit_at, map_frame, parse_numeric, split_frame, FieldValue, FrameKind, TelemetryBundle,
    NAK_MARKER, NOT_AVAILABLE,
};
pub use config::Config;
pub use error::{ConnectorError, Result};
pub use platform::{DeviceIdentity, PlatformClient, PlatformGateway};
pub use protocol::{RegistrationOutcome, Session, SessionEvent, SessionState};
pub use server::{create_router, AppState};
pub use transport::TcpServer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
