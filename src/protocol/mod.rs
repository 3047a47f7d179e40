//! Santak WA/Q6 polling protocol.
//!
//! The server drives a half-duplex request/response cycle over one TCP
//! connection per UPS:
//!
//! ```text
//! Device                              Connector
//!    |                                    |
//!    |------ registration payload ------->|  credential lookup
//!    |<----------- "WA\r" ---------------|  online status published
//!    |                                    |
//!    |------ WA frame (13 tokens) ------->|  telemetry published
//!    |<----------- "Q6\r" ---------------|
//!    |------ Q6 frame (20 tokens) ------->|  telemetry published
//!    |<----------- "WA\r" ---------------|
//!    |              ...                   |  cycle repeats
//! ```
//!
//! The reply token alternates strictly `WA ↔ Q6`, one reply per received
//! frame, and the session never sends two replies without an intervening
//! receive. Silence past the idle deadline is a liveness failure: the
//! device is declared offline and the connection closed.

mod session;

pub use session::{RegistrationOutcome, Session, SessionEvent, SessionState};

/// Idle deadline after which a silent device is declared offline.
pub const IDLE_TIMEOUT_SECS: u64 = 10;

/// Read buffer size; one logical frame must fit in a single receive.
pub const READ_BUFFER_SIZE: usize = 512;

/// Reply soliciting the next WA frame.
pub const REPLY_WA: &str = "WA\r";

/// Reply soliciting the next Q6 frame.
pub const REPLY_Q6: &str = "Q6\r";
