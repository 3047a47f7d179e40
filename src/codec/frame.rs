//! Raw frame tokenization.
//!
//! A frame arrives as one read's worth of bytes. Cleanup strips the
//! device's negative-acknowledgement marker and the optional leading
//! parenthesis, then the remainder splits on whitespace runs.

/// Literal NAK marker some firmware revisions prepend to a frame.
pub const NAK_MARKER: &str = "(NAK\r";

/// The two frame kinds exchanged during the polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Load/status frame, 13 tokens.
    Wa,
    /// Battery/voltage frame, 20 tokens.
    Q6,
}

impl FrameKind {
    /// Token count a well-formed frame of this kind carries.
    pub fn expected_tokens(self) -> usize {
        match self {
            FrameKind::Wa => 13,
            FrameKind::Q6 => 20,
        }
    }

    /// Query code the server sends to solicit this frame kind.
    pub fn request_code(self) -> &'static str {
        match self {
            FrameKind::Wa => "WA",
            FrameKind::Q6 => "Q6",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.request_code())
    }
}

/// Tokenize a raw frame.
///
/// Removes every occurrence of [`NAK_MARKER`], strips one leading `(`,
/// then splits on whitespace runs. Always succeeds; empty input yields
/// an empty vector. The marker can land mid-token, so cleanup happens
/// on the whole string before splitting.
pub fn split_frame(raw: &str) -> Vec<String> {
    let cleaned = raw.replace(NAK_MARKER, "");
    cleaned
        .strip_prefix('(')
        .unwrap_or(&cleaned)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}
