//! Remuxer contract and the pre-assembly buffers it fills for the sink.

mod passthrough;

pub use passthrough::PassthroughRemuxer;

use bytes::Bytes;
use std::collections::VecDeque;

use vodstream_common::TrackKind;

use crate::demux::TrackSet;
use crate::events::Emitter;

/// A media segment ready to append, with its presentation span in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub data: Bytes,
    pub start: f64,
    pub end: f64,
}

/// Pending output for one track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBuffer {
    pub mime: Option<String>,
    pub init: Option<Bytes>,
    pub fragments: VecDeque<Fragment>,
}

/// Per-track pre-assembly buffers between the remuxer and the sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreSource {
    pub video: SourceBuffer,
    pub audio: SourceBuffer,
}

impl PreSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: TrackKind) -> &SourceBuffer {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }

    pub fn get_mut(&mut self, kind: TrackKind) -> &mut SourceBuffer {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        }
    }

    /// Tracks that have an init segment, in video-then-audio order.
    pub fn initialized(&self) -> impl Iterator<Item = TrackKind> + '_ {
        [TrackKind::Video, TrackKind::Audio]
            .into_iter()
            .filter(|k| self.get(*k).init.is_some())
    }

    /// Drop queued fragments. Init segments are kept.
    pub fn clear_queues(&mut self) {
        self.video.fragments.clear();
        self.audio.fragments.clear();
    }

    pub fn queued(&self) -> usize {
        self.video.fragments.len() + self.audio.fragments.len()
    }
}

/// Repackages demuxed samples for the sink.
///
/// Reports `InitSegment` once per track, `MediaSegment` whenever fragments
/// were queued, and `Error` on failure.
pub trait Remuxer: Send {
    fn remux_metadata(
        &mut self,
        kind: TrackKind,
        tracks: &TrackSet,
        out: &mut PreSource,
        emitter: &Emitter,
    );

    fn remux_media(&mut self, tracks: &mut TrackSet, out: &mut PreSource, emitter: &Emitter);

    /// Forget codec-compatibility and reordering state.
    fn reset_compatibility(&mut self) {}

    fn seek(&mut self, _time_secs: f64) {}
}
