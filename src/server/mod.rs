//! Plugin management HTTP API.
//!
//! Thin glue between the platform and the connector: form definitions
//! for device credentials, forced device disconnects, and configuration
//! change notifications. The device-facing protocol lives in
//! [`crate::transport`]; nothing here touches a device socket.

mod handlers;
mod state;

pub use handlers::create_router;
pub use state::AppState;
