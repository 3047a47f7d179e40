//! Frame-kind-specific telemetry mapping.
//!
//! Each frame kind has a fixed table from token position to semantic
//! key. The mapper always produces the full key set for its kind; a
//! malformed token degrades that one value and nothing else.

use std::collections::BTreeMap;

use super::field::{bit_at, parse_numeric, FieldValue};
use super::frame::FrameKind;

/// Decoded measurements and flags from one frame, keyed by semantic name.
pub type TelemetryBundle = BTreeMap<&'static str, FieldValue>;

/// WA frame: numeric fields by position.
const WA_NUMERIC: [(usize, &str); 3] = [
    (0, "loadpower"),
    (3, "loadvirtualpower"),
    (11, "loadpercentage"),
];

/// WA frame: status flags, all taken from bit positions of token 12.
const WA_STATUS: [(usize, &str); 7] = [
    (1, "utilityfailstatus"),
    (2, "batterylowstatus"),
    (3, "bypassstatus"),
    (4, "upsfailedstatus"),
    (5, "upstypestatus"),
    (6, "testinprogressstatus"),
    (7, "shutdownstatus"),
];

/// Q6 frame: numeric fields by position.
const Q6_NUMERIC: [(usize, &str); 7] = [
    (15, "batterylevel"),
    (16, "batterytemperature"),
    (4, "outputvoltage"),
    (3, "inputfrequency"),
    (7, "outputfrequency"),
    (11, "batteryvoltage"),
    (0, "inputvoltage"),
];

/// Map a tokenized frame of the given kind into a telemetry bundle.
///
/// Callers must have verified the token count against
/// [`FrameKind::expected_tokens`]; positions are indexed unchecked by
/// table construction.
pub fn map_frame(kind: FrameKind, tokens: &[String]) -> TelemetryBundle {
    debug_assert_eq!(tokens.len(), kind.expected_tokens());
    let mut bundle = TelemetryBundle::new();
    match kind {
        FrameKind::Wa => {
            for (pos, key) in WA_NUMERIC {
                bundle.insert(key, parse_numeric(&tokens[pos]));
            }
            for (bit, key) in WA_STATUS {
                bundle.insert(key, bit_at(&tokens[12], bit));
            }
        }
        FrameKind::Q6 => {
            for (pos, key) in Q6_NUMERIC {
                bundle.insert(key, parse_numeric(&tokens[pos]));
            }
        }
    }
    bundle
}
