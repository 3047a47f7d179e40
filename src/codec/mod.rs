//! Frame codec and telemetry mapping for the Santak WA/Q6 protocol.
//!
//! The device answers each poll with a single fixed-position frame:
//! whitespace-separated decimal fields, optionally wrapped in a leading
//! `(` and sometimes polluted with a literal `(NAK\r` marker. Decoding
//! is three layers, each best-effort:
//!
//! 1. [`split_frame`]: cleanup and tokenization. Never fails.
//! 2. [`parse_numeric`] / [`bit_at`]: field decoding. Failures degrade
//!    to a sentinel or absent value instead of erroring.
//! 3. [`map_frame`]: fixed position-to-key tables per frame kind,
//!    producing a [`TelemetryBundle`] ready for publishing.

mod field;
mod frame;
mod telemetry;

pub use field::{bit_at, parse_numeric, FieldValue, NOT_AVAILABLE};
pub use frame::{split_frame, FrameKind, NAK_MARKER};
pub use telemetry::{map_frame, TelemetryBundle};
