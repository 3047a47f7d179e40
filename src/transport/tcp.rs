//! TCP connection supervisor for the WA/Q6 polling protocol.
//!
//! The accept loop never blocks on connection I/O: every accepted
//! socket gets its own task driving one [`Session`]. Within a task all
//! work is strictly sequential (receive, decode, publish, reply), so
//! per-device publish order matches frame order. Publishes are
//! fire-and-forget: a gateway failure is logged and never retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ConnectorError, Result};
use crate::platform::PlatformGateway;
use crate::protocol::{
    RegistrationOutcome, Session, SessionEvent, IDLE_TIMEOUT_SECS, READ_BUFFER_SIZE,
};

/// Device-facing TCP server.
pub struct TcpServer<G> {
    listener: TcpListener,
    gateway: Arc<G>,
    idle_timeout: Duration,
}

impl<G: PlatformGateway> TcpServer<G> {
    /// Bind the device listener.
    pub async fn bind(addr: &str, gateway: Arc<G>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ConnectorError::Transport(format!("Failed to bind TCP to {addr}: {e}")))?;
        Ok(Self {
            listener,
            gateway,
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
        })
    }

    /// Override the idle deadline (the protocol default is 10 seconds).
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop. Accept errors are logged and do not stop
    /// the loop; connection failures never propagate here.
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "TCP server listening");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let gateway = Arc::clone(&self.gateway);
                    let idle_timeout = self.idle_timeout;
                    tokio::spawn(async move {
                        handle_connection(gateway, stream, peer, idle_timeout).await;
                    });
                }
                Err(err) => {
                    tracing::error!(%err, "failed to accept TCP connection");
                }
            }
        }
    }
}

/// Drive one device connection until it closes or times out.
async fn handle_connection<G: PlatformGateway>(
    gateway: Arc<G>,
    mut stream: TcpStream,
    peer: SocketAddr,
    idle: Duration,
) {
    tracing::info!(%peer, "device connected");
    let mut session = Session::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let n = match tokio::time::timeout(idle, stream.read(&mut buf)).await {
            Err(_) => {
                // Liveness failure, not a protocol error.
                match session.device_id() {
                    Some(device_id) => {
                        tracing::warn!(%peer, device_id, "idle deadline elapsed, marking offline");
                        if let Err(err) = gateway.publish_status(device_id, false).await {
                            tracing::error!(device_id, %err, "failed to publish offline status");
                        }
                    }
                    None => tracing::warn!(%peer, "idle deadline elapsed before registration"),
                }
                if let Some(credential) = session.credential() {
                    gateway.invalidate_credential(credential).await;
                }
                break;
            }
            Ok(Ok(0)) => {
                tracing::warn!(%peer, "device closed the connection");
                if let Some(credential) = session.credential() {
                    gateway.invalidate_credential(credential).await;
                }
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                tracing::error!(%peer, %err, "failed to read from device");
                // Read failures also clear the cache entry, keeping the
                // resolve/invalidate pairing unconditional across every
                // termination path.
                if let Some(credential) = session.credential() {
                    gateway.invalidate_credential(credential).await;
                }
                break;
            }
        };

        // One receive is one logical frame; the device never fragments
        // within the 512-byte window.
        let message = String::from_utf8_lossy(&buf[..n]).into_owned();
        match session.on_message(&message) {
            SessionEvent::Register { credential } => {
                tracing::info!(%peer, payload = %message, "device registration received");
                let device = match gateway.resolve_device(&credential).await {
                    Ok(device) => device,
                    Err(err) => {
                        tracing::error!(%peer, %err, "device lookup failed");
                        None
                    }
                };
                let device_id = device.map(|d| d.id);
                match session.complete_registration(device_id.as_deref()) {
                    RegistrationOutcome::Accepted { reply } => {
                        let device_id = device_id.unwrap_or_default();
                        tracing::info!(%peer, device_id, "device registered, marking online");
                        if let Err(err) = gateway.publish_status(&device_id, true).await {
                            tracing::error!(device_id, %err, "failed to publish online status");
                        }
                        if let Err(err) = stream.write_all(reply.as_bytes()).await {
                            tracing::error!(%peer, %err, "failed to send registration reply");
                        }
                    }
                    RegistrationOutcome::Rejected => {
                        tracing::warn!(%peer, "registration rejected, closing connection");
                        gateway.invalidate_credential(&credential).await;
                        break;
                    }
                }
            }
            SessionEvent::Poll { telemetry, reply } => {
                if let Some(bundle) = telemetry {
                    // Session guarantees a device id exists once polling.
                    let device_id = session.device_id().unwrap_or_default();
                    tracing::debug!(device_id, ?bundle, "publishing telemetry");
                    if let Err(err) = gateway.publish_telemetry(device_id, &bundle).await {
                        tracing::error!(device_id, %err, "failed to publish telemetry");
                    }
                }
                if let Err(err) = stream.write_all(reply.as_bytes()).await {
                    tracing::error!(%peer, %err, "failed to send poll reply");
                }
            }
            SessionEvent::Ignored => break,
        }
    }

    session.close();
    tracing::info!(%peer, "connection closed");
}
