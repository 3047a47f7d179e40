//! Per-connection session state machine.
//!
//! The machine is pure: it consumes raw frame text and produces events
//! describing what the transport layer must do (look up a credential,
//! publish telemetry, write a reply). All socket and platform I/O lives
//! in [`crate::transport`], which keeps every transition unit-testable.

use crate::codec::{map_frame, split_frame, FrameKind, TelemetryBundle};

use super::{REPLY_Q6, REPLY_WA};

/// Protocol phase of one device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No registration frame received yet.
    Unauthenticated,
    /// "WA\r" sent, next frame is expected to be a 13-token WA answer.
    PollingWa,
    /// "Q6\r" sent, next frame is expected to be a 20-token Q6 answer.
    PollingQ6,
    /// Terminal; reached from any state.
    Closed,
}

/// What the transport must do after feeding one received frame in.
#[derive(Debug, PartialEq)]
pub enum SessionEvent {
    /// First frame on the connection: resolve this credential against the
    /// platform, then report back via [`Session::complete_registration`].
    Register {
        /// Raw registration payload wrapped in the credential envelope.
        credential: String,
    },
    /// Polling-cycle frame: publish the bundle if one decoded, then send
    /// the reply and wait for the next frame.
    Poll {
        /// Decoded telemetry; `None` when the frame had the wrong token
        /// count and was discarded.
        telemetry: Option<TelemetryBundle>,
        /// Alternating reply code, always `\r`-terminated.
        reply: &'static str,
    },
    /// Frame received after the session closed; nothing to do.
    Ignored,
}

/// Result of the platform credential lookup.
#[derive(Debug, PartialEq)]
pub enum RegistrationOutcome {
    /// Device resolved: publish online status and send the reply.
    Accepted {
        /// Reply soliciting the first WA frame.
        reply: &'static str,
    },
    /// Lookup returned no device: invalidate the credential and close
    /// without replying.
    Rejected,
}

/// One device connection's protocol state.
///
/// Owned exclusively by its driving task; never shared across
/// connections.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    credential: Option<String>,
    device_id: Option<String>,
}

impl Session {
    /// Create a fresh unauthenticated session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            credential: None,
            device_id: None,
        }
    }

    /// Current protocol phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Credential negotiated on this connection, if any.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Device identifier resolved by a successful registration.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Feed one received frame into the machine.
    pub fn on_message(&mut self, raw: &str) -> SessionEvent {
        match self.state {
            SessionState::Unauthenticated => {
                // The raw payload is wrapped verbatim, not JSON-escaped;
                // the platform stores the envelope as an opaque voucher.
                let credential = format!("{{\"santak_reg_pkg\":\"{raw}\"}}");
                self.credential = Some(credential.clone());
                SessionEvent::Register { credential }
            }
            SessionState::PollingWa => {
                let telemetry = self.decode(FrameKind::Wa, raw);
                self.state = SessionState::PollingQ6;
                SessionEvent::Poll {
                    telemetry,
                    reply: REPLY_Q6,
                }
            }
            SessionState::PollingQ6 => {
                let telemetry = self.decode(FrameKind::Q6, raw);
                self.state = SessionState::PollingWa;
                SessionEvent::Poll {
                    telemetry,
                    reply: REPLY_WA,
                }
            }
            SessionState::Closed => SessionEvent::Ignored,
        }
    }

    /// Record the platform's answer to the registration lookup.
    ///
    /// An empty identifier counts as not-found: the device must
    /// reconnect and resend its registration payload.
    pub fn complete_registration(&mut self, device_id: Option<&str>) -> RegistrationOutcome {
        match device_id {
            Some(id) if !id.is_empty() => {
                self.device_id = Some(id.to_string());
                self.state = SessionState::PollingWa;
                RegistrationOutcome::Accepted { reply: REPLY_WA }
            }
            _ => {
                self.state = SessionState::Closed;
                RegistrationOutcome::Rejected
            }
        }
    }

    /// Move to the terminal state.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    fn decode(&self, kind: FrameKind, raw: &str) -> Option<TelemetryBundle> {
        let tokens = split_frame(raw);
        if tokens.len() == kind.expected_tokens() {
            Some(map_frame(kind, &tokens))
        } else {
            tracing::debug!(
                device_id = self.device_id.as_deref().unwrap_or(""),
                kind = %kind,
                tokens = tokens.len(),
                expected = kind.expected_tokens(),
                "frame token count mismatch, discarding"
            );
            None
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldValue;

    const WA_FRAME: &str = "100.0 0 0 50.0 0 0 0 0 0 0 0 80.0 10010110";
    const Q6_FRAME: &str = "220.0 0 0 50.0 230.0 0 0 50.0 0 0 0 13.6 0 0 0 95.0 27.0 0 0 0";

    fn registered_session() -> Session {
        let mut session = Session::new();
        session.on_message("REG123");
        let outcome = session.complete_registration(Some("dev-1"));
        assert_eq!(outcome, RegistrationOutcome::Accepted { reply: "WA\r" });
        session
    }

    #[test]
    fn test_registration_wraps_credential() {
        let mut session = Session::new();
        let event = session.on_message("REG123");
        assert_eq!(
            event,
            SessionEvent::Register {
                credential: "{\"santak_reg_pkg\":\"REG123\"}".to_string()
            }
        );
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.credential(), Some("{\"santak_reg_pkg\":\"REG123\"}"));
    }

    #[test]
    fn test_registration_accepted() {
        let session = registered_session();
        assert_eq!(session.state(), SessionState::PollingWa);
        assert_eq!(session.device_id(), Some("dev-1"));
    }

    #[test]
    fn test_registration_rejected_on_missing_device() {
        let mut session = Session::new();
        session.on_message("REG123");
        assert_eq!(
            session.complete_registration(None),
            RegistrationOutcome::Rejected
        );
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_registration_rejected_on_empty_id() {
        let mut session = Session::new();
        session.on_message("REG123");
        assert_eq!(
            session.complete_registration(Some("")),
            RegistrationOutcome::Rejected
        );
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_wa_frame_decodes_and_advances() {
        let mut session = registered_session();
        match session.on_message(WA_FRAME) {
            SessionEvent::Poll { telemetry, reply } => {
                assert_eq!(reply, "Q6\r");
                let bundle = telemetry.expect("13-token frame should decode");
                assert_eq!(bundle["loadpower"], FieldValue::Number(100.0));
                assert_eq!(bundle["loadpercentage"], FieldValue::Number(80.0));
                assert_eq!(bundle["utilityfailstatus"], FieldValue::Flag(1));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(session.state(), SessionState::PollingQ6);
    }

    #[test]
    fn test_short_frame_discarded_but_phase_advances() {
        let mut session = registered_session();
        match session.on_message("1 2 3 4 5") {
            SessionEvent::Poll { telemetry, reply } => {
                assert!(telemetry.is_none());
                assert_eq!(reply, "Q6\r");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(session.state(), SessionState::PollingQ6);
    }

    #[test]
    fn test_reply_sequence_alternates_strictly() {
        let mut session = registered_session();
        let frames = [WA_FRAME, "garbage", Q6_FRAME, "1 2 3", WA_FRAME, Q6_FRAME];
        let mut replies = Vec::new();
        for frame in frames {
            match session.on_message(frame) {
                SessionEvent::Poll { reply, .. } => replies.push(reply),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(replies, ["Q6\r", "WA\r", "Q6\r", "WA\r", "Q6\r", "WA\r"]);
    }

    #[test]
    fn test_q6_frame_decodes() {
        let mut session = registered_session();
        session.on_message(WA_FRAME);
        match session.on_message(Q6_FRAME) {
            SessionEvent::Poll { telemetry, reply } => {
                assert_eq!(reply, "WA\r");
                let bundle = telemetry.expect("20-token frame should decode");
                assert_eq!(bundle["inputvoltage"], FieldValue::Number(220.0));
                assert_eq!(bundle["batterylevel"], FieldValue::Number(95.0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_closed_session_ignores_frames() {
        let mut session = registered_session();
        session.close();
        assert_eq!(session.on_message(WA_FRAME), SessionEvent::Ignored);
        assert_eq!(session.state(), SessionState::Closed);
    }
}
