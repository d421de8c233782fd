//! Demuxer contract and the track sample queues it fills.

mod passthrough;

pub use passthrough::PassthroughDemuxer;

use bytes::Bytes;

use vodstream_common::TrackKind;
use vodstream_media::{BufferChannel, Segment};

use crate::events::Emitter;

/// One elementary-stream access unit. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub dts_ms: u64,
    pub pts_ms: u64,
    pub duration_ms: u64,
    pub keyframe: bool,
    pub data: Bytes,
}

/// Per-track metadata, present once the demuxer has seen the track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMeta {
    pub codec: Option<String>,
    /// Stamped with the stream duration when metadata is parsed.
    pub duration_ms: u64,
    pub timescale: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub kind: TrackKind,
    pub meta: Option<TrackMeta>,
    pub samples: Vec<Sample>,
}

impl Track {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            meta: None,
            samples: Vec::new(),
        }
    }
}

/// Video and audio sample queues shared by the demuxer and the remuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSet {
    pub video: Track,
    pub audio: Track,
}

impl TrackSet {
    pub fn new() -> Self {
        Self {
            video: Track::new(TrackKind::Video),
            audio: Track::new(TrackKind::Audio),
        }
    }

    pub fn get(&self, kind: TrackKind) -> &Track {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }

    pub fn get_mut(&mut self, kind: TrackKind) -> &mut Track {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        }
    }

    /// Drop queued samples on both tracks. Metadata is kept.
    pub fn clear_samples(&mut self) {
        self.video.samples.clear();
        self.audio.samples.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.video.samples.len() + self.audio.samples.len()
    }
}

impl Default for TrackSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns segment bytes into track samples.
///
/// Implementations drain `input`, push samples into `tracks` and report
/// through `emitter`: `MetadataParsed` the first time a track is seen,
/// `Complete` once the segment is consumed, `Error` on failure.
pub trait Demuxer: Send {
    fn demux(
        &mut self,
        segment: &Segment,
        input: &mut BufferChannel,
        tracks: &mut TrackSet,
        emitter: &Emitter,
    );

    /// Recalibrate internal timeline state after a cold seek.
    fn seek(&mut self, _time_secs: f64) {}
}
