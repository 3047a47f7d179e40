//! Shared state for the plugin HTTP API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::platform::PlatformClient;

/// Application state shared across handlers
pub struct AppState {
    /// Platform client (device cache + publishers)
    pub platform: Arc<PlatformClient>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(platform: Arc<PlatformClient>) -> Self {
        Self {
            platform,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
