//! End-to-end device session tests.
//!
//! These run the real TCP supervisor against a mock platform gateway
//! and a scripted device on the other end of the socket, covering
//! registration, the alternating poll cycle, malformed frames, idle
//! timeouts, and credential-cache hygiene.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use santak_rtu::{
    DeviceIdentity, FieldValue, PlatformGateway, Result, TcpServer, TelemetryBundle,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

const WA_FRAME: &str = "100.0 0 0 50.0 0 0 0 0 0 0 0 80.0 10010110";
const Q6_FRAME: &str = "220.0 0 0 50.0 230.0 0 0 50.0 0 0 0 13.6 0 0 0 95.0 27.0 0 0 0";

/// Credential envelope the connector builds from a registration payload.
fn credential_for(raw: &str) -> String {
    format!("{{\"santak_reg_pkg\":\"{raw}\"}}")
}

/// Scripted platform gateway recording every call.
#[derive(Default)]
struct MockGateway {
    devices: HashMap<String, String>,
    invalidations: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(String, bool)>>,
    telemetry: Mutex<Vec<(String, TelemetryBundle)>>,
}

impl MockGateway {
    fn with_device(raw_payload: &str, device_id: &str) -> Self {
        let mut devices = HashMap::new();
        devices.insert(credential_for(raw_payload), device_id.to_string());
        Self {
            devices,
            ..Self::default()
        }
    }
}

impl PlatformGateway for MockGateway {
    async fn resolve_device(&self, credential: &str) -> Result<Option<DeviceIdentity>> {
        Ok(self.devices.get(credential).map(|id| DeviceIdentity {
            id: id.clone(),
            device_number: String::new(),
        }))
    }

    async fn invalidate_credential(&self, credential: &str) {
        self.invalidations.lock().await.push(credential.to_string());
    }

    async fn publish_status(&self, device_id: &str, online: bool) -> Result<()> {
        self.statuses
            .lock()
            .await
            .push((device_id.to_string(), online));
        Ok(())
    }

    async fn publish_telemetry(&self, device_id: &str, bundle: &TelemetryBundle) -> Result<()> {
        self.telemetry
            .lock()
            .await
            .push((device_id.to_string(), bundle.clone()));
        Ok(())
    }
}

/// Start a supervisor on an ephemeral port, returning its address.
async fn start_server(gateway: Arc<MockGateway>, idle_timeout: Duration) -> SocketAddr {
    let server = TcpServer::bind("127.0.0.1:0", gateway)
        .await
        .unwrap()
        .with_idle_timeout(idle_timeout);
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn read_reply(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("reply timed out")
        .expect("read failed");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Connect and register, asserting the `WA\r` reply.
async fn register(addr: SocketAddr, payload: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload.as_bytes()).await.unwrap();
    assert_eq!(read_reply(&mut stream).await, "WA\r");
    stream
}

/// Wait until `predicate` holds against the gateway, bounded at 3s.
async fn wait_for<F, Fut>(mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..60 {
        if predicate().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached within 3s");
}

#[tokio::test]
async fn test_registration_replies_wa_and_publishes_online() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let _stream = register(addr, "REG123").await;

    let statuses = gateway.statuses.lock().await;
    assert_eq!(*statuses, vec![("dev-1".to_string(), true)]);
}

#[tokio::test]
async fn test_wa_frame_publishes_telemetry_and_advances() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let mut stream = register(addr, "REG123").await;
    stream.write_all(WA_FRAME.as_bytes()).await.unwrap();
    assert_eq!(read_reply(&mut stream).await, "Q6\r");

    let telemetry = gateway.telemetry.lock().await;
    assert_eq!(telemetry.len(), 1);
    let (device_id, bundle) = &telemetry[0];
    assert_eq!(device_id, "dev-1");
    assert_eq!(bundle["loadpower"], FieldValue::Number(100.0));
    assert_eq!(bundle["loadpercentage"], FieldValue::Number(80.0));
    assert_eq!(bundle["utilityfailstatus"], FieldValue::Flag(1));
}

#[tokio::test]
async fn test_short_frame_discarded_but_cycle_continues() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let mut stream = register(addr, "REG123").await;
    stream.write_all(b"1 2 3 4 5").await.unwrap();
    assert_eq!(read_reply(&mut stream).await, "Q6\r");

    assert!(gateway.telemetry.lock().await.is_empty());
}

#[tokio::test]
async fn test_reply_sequence_alternates_despite_malformed_frames() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let mut stream = register(addr, "REG123").await;
    let mut replies = Vec::new();
    for frame in [WA_FRAME, "garbage", Q6_FRAME, "1 2 3", WA_FRAME] {
        stream.write_all(frame.as_bytes()).await.unwrap();
        replies.push(read_reply(&mut stream).await);
    }
    assert_eq!(replies, ["Q6\r", "WA\r", "Q6\r", "WA\r", "Q6\r"]);

    // Only the frames matching the phase's expected token count were
    // published: the Q6 answer arrived while a WA frame was expected,
    // so it was discarded along with the garbage.
    let telemetry = gateway.telemetry.lock().await;
    assert_eq!(telemetry.len(), 2);
    assert!(telemetry[0].1.contains_key("loadpower"));
    assert!(telemetry[1].1.contains_key("loadpower"));
}

#[tokio::test]
async fn test_idle_timeout_publishes_offline_and_invalidates() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_millis(200)).await;

    let _stream = register(addr, "REG123").await;

    wait_for(|| {
        let gateway = Arc::clone(&gateway);
        async move {
            gateway
                .statuses
                .lock()
                .await
                .contains(&("dev-1".to_string(), false))
        }
    })
    .await;

    wait_for(|| {
        let gateway = Arc::clone(&gateway);
        async move { !gateway.invalidations.lock().await.is_empty() }
    })
    .await;
    let invalidations = gateway.invalidations.lock().await;
    assert_eq!(*invalidations, vec![credential_for("REG123")]);
}

#[tokio::test]
async fn test_unknown_credential_closes_without_reply() {
    let gateway = Arc::new(MockGateway::default());
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"UNKNOWN").await.unwrap();

    // Server closes without replying: the next read returns EOF.
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("close timed out")
        .expect("read failed");
    assert_eq!(n, 0);

    wait_for(|| {
        let gateway = Arc::clone(&gateway);
        async move { !gateway.invalidations.lock().await.is_empty() }
    })
    .await;
    assert_eq!(
        *gateway.invalidations.lock().await,
        vec![credential_for("UNKNOWN")]
    );
    assert!(gateway.statuses.lock().await.is_empty());
}

#[tokio::test]
async fn test_clean_close_invalidates_credential() {
    let gateway = Arc::new(MockGateway::with_device("REG123", "dev-1"));
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let stream = register(addr, "REG123").await;
    drop(stream);

    wait_for(|| {
        let gateway = Arc::clone(&gateway);
        async move { !gateway.invalidations.lock().await.is_empty() }
    })
    .await;
    assert_eq!(
        *gateway.invalidations.lock().await,
        vec![credential_for("REG123")]
    );
    // Clean close publishes no offline status.
    assert_eq!(*gateway.statuses.lock().await, vec![("dev-1".to_string(), true)]);
}

#[tokio::test]
async fn test_concurrent_devices_are_independent() {
    let mut devices = HashMap::new();
    devices.insert(credential_for("REG-A"), "dev-a".to_string());
    devices.insert(credential_for("REG-B"), "dev-b".to_string());
    let gateway = Arc::new(MockGateway {
        devices,
        ..MockGateway::default()
    });
    let addr = start_server(Arc::clone(&gateway), Duration::from_secs(10)).await;

    let mut a = register(addr, "REG-A").await;
    let mut b = register(addr, "REG-B").await;

    a.write_all(WA_FRAME.as_bytes()).await.unwrap();
    assert_eq!(read_reply(&mut a).await, "Q6\r");
    b.write_all(WA_FRAME.as_bytes()).await.unwrap();
    assert_eq!(read_reply(&mut b).await, "Q6\r");

    let telemetry = gateway.telemetry.lock().await;
    let ids: Vec<&str> = telemetry.iter().map(|(id, _)| id.as_str()).collect();
    assert!(ids.contains(&"dev-a"));
    assert!(ids.contains(&"dev-b"));
}
