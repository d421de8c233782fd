//! Core type definitions shared by the pipeline components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Elementary track kind produced by the demuxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Category of an error reported to the playback layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ManifestLoad,
    ManifestParse,
    SegmentLoad,
    KeyLoad,
    Decrypt,
    Demux,
    Remux,
    SinkAppend,
    RetryBudgetExceeded,
}

impl ErrorKind {
    /// Load failures the orchestrator retries on its own while budget remains.
    pub fn is_retried(&self) -> bool {
        matches!(self, Self::ManifestLoad | Self::SegmentLoad | Self::KeyLoad)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ManifestLoad => "MANIFEST_LOAD_ERROR",
            Self::ManifestParse => "MANIFEST_PARSE_ERROR",
            Self::SegmentLoad => "SEGMENT_LOAD_ERROR",
            Self::KeyLoad => "KEY_LOAD_ERROR",
            Self::Decrypt => "DECRYPT_ERROR",
            Self::Demux => "DEMUX_ERROR",
            Self::Remux => "REMUX_ERROR",
            Self::SinkAppend => "SINK_APPEND_ERROR",
            Self::RetryBudgetExceeded => "RETRY_BUDGET_EXCEEDED",
        };
        f.write_str(s)
    }
}

/// Normalized error surfaced to the playback layer.
///
/// `details` always has the shape `"[<module>]: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsError {
    pub kind: ErrorKind,
    pub details: String,
    pub fatal: bool,
}

impl HlsError {
    pub fn new(kind: ErrorKind, module: &str, message: impl fmt::Display, fatal: bool) -> Self {
        Self {
            kind,
            details: format!("[{module}]: {message}"),
            fatal,
        }
    }
}

impl fmt::Display for HlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.kind,
            self.details,
            if self.fatal { " (fatal)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_kind_serialization() {
        assert_eq!(serde_json::to_string(&TrackKind::Video).unwrap(), "\"video\"");
        assert_eq!(serde_json::to_string(&TrackKind::Audio).unwrap(), "\"audio\"");
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ManifestParse.to_string(), "MANIFEST_PARSE_ERROR");
        assert_eq!(
            ErrorKind::RetryBudgetExceeded.to_string(),
            "RETRY_BUDGET_EXCEEDED"
        );
    }

    #[test]
    fn test_error_kind_is_retried() {
        assert!(ErrorKind::SegmentLoad.is_retried());
        assert!(ErrorKind::KeyLoad.is_retried());
        assert!(!ErrorKind::Decrypt.is_retried());
        assert!(!ErrorKind::RetryBudgetExceeded.is_retried());
    }

    #[test]
    fn test_hls_error_details_shape() {
        let err = HlsError::new(ErrorKind::Demux, "ts-demuxer", "bad sync byte", false);
        assert_eq!(err.details, "[ts-demuxer]: bad sync byte");
        assert!(!err.fatal);
        assert_eq!(err.to_string(), "DEMUX_ERROR [ts-demuxer]: bad sync byte");
    }

    #[test]
    fn test_hls_error_fatal_display() {
        let err = HlsError::new(ErrorKind::SegmentLoad, "loader", "404", true);
        assert!(err.to_string().ends_with("(fatal)"));
    }
}
