//! Segment descriptors as produced by the manifest parser and as tracked by
//! the registry.

use bytes::Bytes;

use crate::crypto::EncryptionMethod;

/// A segment as described by a parsed manifest. Carries no download state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentDescriptor {
    /// Absolute segment URL.
    pub url: String,
    /// Presentation start time in milliseconds. Unique registry key.
    pub start_ms: u64,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Media sequence number (used to derive an IV when none is declared).
    pub sequence: u64,
}

/// A registry entry: descriptor plus download state.
///
/// The flags are private; only [`Playlist`](super::Playlist) methods change
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub url: String,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub sequence: u64,
    pub(crate) downloading: bool,
    pub(crate) downloaded: bool,
}

impl Segment {
    pub(crate) fn from_descriptor(desc: &SegmentDescriptor) -> Self {
        Self {
            url: desc.url.clone(),
            start_ms: desc.start_ms,
            duration_ms: desc.duration_ms,
            sequence: desc.sequence,
            downloading: false,
            downloaded: false,
        }
    }

    /// End of the segment interval (exclusive), in milliseconds.
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    /// Whether `time_ms` falls inside `[start_ms, end_ms)`.
    pub fn contains(&self, time_ms: u64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms()
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }
}

/// Stream-level encryption record (`#EXT-X-KEY`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptInfo {
    /// Key URI, absolute once resolved against the manifest URL.
    pub uri: Option<String>,
    pub method: EncryptionMethod,
    /// Key bytes, filled in once the key fetch completes.
    pub key: Option<Bytes>,
    /// Explicit IV from the manifest, if declared.
    pub iv: Option<[u8; 16]>,
}

impl EncryptInfo {
    /// Encryption that still needs its key fetched.
    pub fn needs_key(&self) -> bool {
        self.method != EncryptionMethod::None && self.uri.is_some() && self.key.is_none()
    }
}

/// Output of the manifest parser, input of [`Playlist::merge_manifest`](super::Playlist::merge_manifest).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub segments: Vec<SegmentDescriptor>,
    pub target_duration_ms: u64,
    /// Total duration; sum of segment durations.
    pub duration_ms: u64,
    pub encrypt: Option<EncryptInfo>,
    /// `#EXT-X-ENDLIST` seen.
    pub ended: bool,
}
