//! Field-level decoding for WA/Q6 frame tokens.
//!
//! Decoding is best-effort by design: the device firmware occasionally
//! emits garbage in a single column, and one bad field must not block
//! publishing the rest of the bundle. Numeric parse failures map to a
//! fixed placeholder value, bit lookups past the end of a status token
//! map to an absent value.

use serde::{Serialize, Serializer};

/// Placeholder published when a numeric field fails to parse.
///
/// Downstream consumers see this literal string amid otherwise-numeric
/// fields; the platform contract expects it.
pub const NOT_AVAILABLE: &str = "___._";

/// A decoded telemetry field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Numeric measurement, rounded to one decimal place.
    Number(f64),
    /// Single-digit status flag.
    Flag(u8),
    /// Numeric field that failed to parse; serialized as [`NOT_AVAILABLE`].
    NotAvailable,
    /// Status bit position past the end of the token; serialized as `null`.
    Absent,
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(v) => serializer.serialize_f64(*v),
            FieldValue::Flag(d) => serializer.serialize_u8(*d),
            FieldValue::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
            FieldValue::Absent => serializer.serialize_none(),
        }
    }
}

/// Parse a decimal token as a 32-bit-precision float rounded to one
/// decimal place (half away from zero).
///
/// Returns [`FieldValue::NotAvailable`] on parse failure instead of an
/// error so one malformed field never aborts the bundle.
pub fn parse_numeric(token: &str) -> FieldValue {
    match token.parse::<f32>() {
        Ok(value) => {
            let rounded = (f64::from(value) * 10.0).round() / 10.0;
            FieldValue::Number(rounded)
        }
        Err(err) => {
            tracing::error!(token, %err, "numeric field parse failed");
            FieldValue::NotAvailable
        }
    }
}

/// Read the digit at 1-based `position` in a status token.
///
/// Positions past the end of the token are logged and map to
/// [`FieldValue::Absent`]; a non-digit character maps to `Flag(0)`.
pub fn bit_at(token: &str, position: usize) -> FieldValue {
    if position == 0 || position > token.len() {
        tracing::error!(token, position, "status bit position out of range");
        return FieldValue::Absent;
    }
    match token.as_bytes()[position - 1] {
        b @ b'0'..=b'9' => FieldValue::Flag(b - b'0'),
        other => {
            tracing::error!(token, position, byte = other, "status bit is not a digit");
            FieldValue::Flag(0)
        }
    }
}
