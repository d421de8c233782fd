//! Segment registry for VOD playback.
//!
//! The registry maps presentation start time (ms) to a [`Segment`], plus the
//! stream-level metadata from the manifest. It performs no I/O; the
//! orchestrator is its only writer and changes download state exclusively
//! through the methods below.

mod segment;

pub use segment::{EncryptInfo, ParsedManifest, Segment, SegmentDescriptor};

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};

/// Ordered segment registry keyed by start time in milliseconds.
#[derive(Debug, Default)]
pub struct Playlist {
    entries: BTreeMap<u64, Segment>,
    by_url: HashMap<String, u64>,
    target_duration_ms: u64,
    duration_ms: u64,
    encrypt: Option<EncryptInfo>,
    last_downloaded: Option<u64>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a parsed manifest into the registry.
    ///
    /// New start times are inserted; existing ones are updated in place. An
    /// entry that is currently downloading is never replaced or dropped, and
    /// entries absent from `manifest` are kept.
    pub fn merge_manifest(&mut self, manifest: &ParsedManifest) {
        for desc in &manifest.segments {
            match self.entries.get_mut(&desc.start_ms) {
                None => {
                    self.by_url.insert(desc.url.clone(), desc.start_ms);
                    self.entries
                        .insert(desc.start_ms, Segment::from_descriptor(desc));
                }
                Some(existing) if existing.url == desc.url => {
                    existing.duration_ms = desc.duration_ms;
                    existing.sequence = desc.sequence;
                }
                Some(existing) if existing.downloading => {
                    tracing::debug!(
                        start_ms = desc.start_ms,
                        url = %existing.url,
                        "Keeping in-flight segment over manifest update"
                    );
                }
                Some(existing) => {
                    self.by_url.remove(&existing.url);
                    *existing = Segment::from_descriptor(desc);
                    self.by_url.insert(desc.url.clone(), desc.start_ms);
                }
            }
        }

        if manifest.target_duration_ms > 0 {
            self.target_duration_ms = manifest.target_duration_ms;
        }
        self.duration_ms = self.duration_ms.max(manifest.duration_ms);

        if let Some(incoming) = &manifest.encrypt {
            let keep_resolved = matches!(
                &self.encrypt,
                Some(current) if current.uri == incoming.uri && current.key.is_some()
            );
            if !keep_resolved {
                self.encrypt = Some(incoming.clone());
            }
        }
    }

    /// Segment whose interval contains `time_ms`, else the nearest segment
    /// starting after it.
    pub fn lookup(&self, time_ms: u64) -> Option<&Segment> {
        if let Some((_, seg)) = self.entries.range(..=time_ms).next_back() {
            if seg.contains(time_ms) {
                return Some(seg);
            }
        }
        self.entries
            .range(time_ms.saturating_add(1)..)
            .next()
            .map(|(_, seg)| seg)
    }

    /// Segment whose interval contains `time_ms`, without the forward
    /// fallback of [`lookup`](Self::lookup).
    pub fn segment_at(&self, time_ms: u64) -> Option<&Segment> {
        self.entries
            .range(..=time_ms)
            .next_back()
            .map(|(_, seg)| seg)
            .filter(|seg| seg.contains(time_ms))
    }

    /// Most recently marked-downloaded segment.
    pub fn last_downloaded(&self) -> Option<&Segment> {
        self.last_downloaded.and_then(|key| self.entries.get(&key))
    }

    pub fn get(&self, url: &str) -> Option<&Segment> {
        self.by_url.get(url).and_then(|key| self.entries.get(key))
    }

    /// Flag a segment as being fetched. Unknown URLs are ignored.
    pub fn mark_downloading(&mut self, url: &str) -> bool {
        match self.entry_mut(url) {
            Some(seg) => {
                seg.downloading = true;
                true
            }
            None => {
                tracing::debug!(url, "mark_downloading: segment not in registry");
                false
            }
        }
    }

    /// Flag a segment as fetched and handed off. Unknown URLs are ignored.
    pub fn mark_downloaded(&mut self, url: &str) -> bool {
        let Some(key) = self.by_url.get(url).copied() else {
            tracing::debug!(url, "mark_downloaded: segment not in registry");
            return false;
        };
        if let Some(seg) = self.entries.get_mut(&key) {
            seg.downloading = false;
            seg.downloaded = true;
            self.last_downloaded = Some(key);
        }
        true
    }

    /// Clear the downloading flag after a failed fetch so it can be retried.
    pub fn mark_failed(&mut self, url: &str) -> bool {
        match self.entry_mut(url) {
            Some(seg) => {
                seg.downloading = false;
                true
            }
            None => false,
        }
    }

    /// Reset every `downloading`/`downloaded` flag.
    pub fn clear_downloaded(&mut self) {
        for seg in self.entries.values_mut() {
            seg.downloading = false;
            seg.downloaded = false;
        }
        self.last_downloaded = None;
    }

    /// Drop all entries and metadata.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Registered start times in ascending order.
    pub fn start_times(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.entries.values()
    }

    pub fn downloading_count(&self) -> usize {
        self.entries.values().filter(|s| s.downloading).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target_duration_ms(&self) -> u64 {
        self.target_duration_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn encrypt(&self) -> Option<&EncryptInfo> {
        self.encrypt.as_ref()
    }

    /// Store the fetched key into the encryption record.
    pub fn set_key(&mut self, key: Bytes) {
        if let Some(encrypt) = self.encrypt.as_mut() {
            encrypt.key = Some(key);
        }
    }

    fn entry_mut(&mut self, url: &str) -> Option<&mut Segment> {
        let key = self.by_url.get(url)?;
        self.entries.get_mut(key)
    }
}
