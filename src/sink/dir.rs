//! Sink that writes segments to a directory tree.
//!
//! Layout: `<root>/<track>/init.seg` plus one `<start_ms>.seg` file per
//! media fragment, zero-padded so a directory listing sorts by time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use vodstream_common::{Result, TimeRanges, TrackKind};

use super::MediaSink;
use crate::remux::PreSource;

#[derive(Debug)]
pub struct DirSink {
    root: PathBuf,
    endpoints: HashMap<TrackKind, PathBuf>,
    buffered: HashMap<TrackKind, TimeRanges>,
    bytes_written: u64,
    ended: bool,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            endpoints: HashMap::new(),
            buffered: HashMap::new(),
            bytes_written: 0,
            ended: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Buffered ranges for one track.
    pub fn track_ranges(&self, kind: TrackKind) -> TimeRanges {
        self.buffered.get(&kind).cloned().unwrap_or_default()
    }
}

impl MediaSink for DirSink {
    fn add_source_endpoints(&mut self, source: &PreSource) -> Result<()> {
        for kind in source.initialized() {
            if self.endpoints.contains_key(&kind) {
                continue;
            }
            let dir = self.root.join(kind.to_string());
            fs::create_dir_all(&dir)?;

            if let Some(init) = source.get(kind).init.as_ref().filter(|b| !b.is_empty()) {
                fs::write(dir.join("init.seg"), init)?;
                self.bytes_written += init.len() as u64;
            }

            tracing::debug!(track = %kind, dir = %dir.display(), "Created sink endpoint");
            self.endpoints.insert(kind, dir);
            self.buffered.entry(kind).or_default();
        }
        Ok(())
    }

    fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    fn append(&mut self, source: &mut PreSource) -> Result<usize> {
        let mut written = 0;
        for (kind, dir) in &self.endpoints {
            let queue = &mut source.get_mut(*kind).fragments;
            while let Some(fragment) = queue.pop_front() {
                let start_ms = (fragment.start * 1000.0).round() as u64;
                fs::write(dir.join(format!("{start_ms:010}.seg")), &fragment.data)?;
                self.bytes_written += fragment.data.len() as u64;
                self.buffered
                    .entry(*kind)
                    .or_default()
                    .add(fragment.start, fragment.end);
                written += 1;
            }
        }
        Ok(written)
    }

    fn end_of_stream(&mut self) {
        tracing::info!(
            root = %self.root.display(),
            bytes = self.bytes_written,
            "Sink reached end of stream"
        );
        self.ended = true;
    }

    /// Intersection of every endpoint's ranges.
    fn buffered_ranges(&self) -> TimeRanges {
        let mut tracks = self
            .endpoints
            .keys()
            .filter_map(|kind| self.buffered.get(kind));
        let Some(first) = tracks.next() else {
            return TimeRanges::new();
        };
        tracks.fold(first.clone(), |acc, r| acc.intersect(r))
    }

    fn seek(&mut self, time_secs: f64) {
        tracing::debug!(time_secs, "Sink seek");
        self.ended = false;
    }
}
