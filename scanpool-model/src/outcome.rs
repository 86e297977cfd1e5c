use std::fmt;

use crate::geometry::Quad;

/// Routine, non-fatal reasons a frame produced no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DecodeErrorKind {
    /// No code was located in the frame.
    PatternNotFound,
    /// A code was located but its payload could not be extracted.
    PayloadCorrupted,
    /// The decode overran the configured per-slot deadline.
    TimedOut,
}

impl DecodeErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeErrorKind::PatternNotFound => "pattern not found",
            DecodeErrorKind::PayloadCorrupted => "payload corrupted",
            DecodeErrorKind::TimedOut => "timed out",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one completed decode. Exactly one of `error` and `payload` is
/// set; `location` only accompanies a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOutcome {
    pub error: Option<DecodeErrorKind>,
    pub payload: Option<String>,
    pub location: Option<Quad>,
    pub latency_ms: u64,
}

impl DecodeOutcome {
    pub fn found(
        payload: impl Into<String>,
        location: Option<Quad>,
        latency_ms: u64,
    ) -> Self {
        Self {
            error: None,
            payload: Some(payload.into()),
            location,
            latency_ms,
        }
    }

    pub fn missed(kind: DecodeErrorKind, latency_ms: u64) -> Self {
        Self {
            error: Some(kind),
            payload: None,
            location: None,
            latency_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
