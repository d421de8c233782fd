//! Demuxer for segments already in a sink-ready container.

use vodstream_common::TrackKind;
use vodstream_media::{BufferChannel, Segment};

use super::{Demuxer, Sample, TrackMeta, TrackSet};
use crate::events::{DemuxSignal, Emitter};

/// Emits each segment as a single video sample spanning the segment.
#[derive(Debug, Default)]
pub struct PassthroughDemuxer {
    codec: Option<String>,
}

impl PassthroughDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec string reported in the track metadata.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = Some(codec.into());
        self
    }
}

impl Demuxer for PassthroughDemuxer {
    fn demux(
        &mut self,
        segment: &Segment,
        input: &mut BufferChannel,
        tracks: &mut TrackSet,
        emitter: &Emitter,
    ) {
        let data = input.shift();
        if data.is_empty() {
            emitter.emit(DemuxSignal::Error {
                module: "passthrough-demuxer".into(),
                message: format!("no bytes for segment {}", segment.url),
                fatal: Some(false),
            });
            return;
        }

        let track = &mut tracks.video;
        if track.meta.is_none() {
            track.meta = Some(TrackMeta {
                codec: self.codec.clone(),
                duration_ms: 0,
                timescale: 1000,
            });
            emitter.emit(DemuxSignal::MetadataParsed(TrackKind::Video));
        }

        tracing::trace!(url = %segment.url, bytes = data.len(), "Passthrough demux");
        track.samples.push(Sample {
            dts_ms: segment.start_ms,
            pts_ms: segment.start_ms,
            duration_ms: segment.duration_ms,
            keyframe: true,
            data,
        });
        emitter.emit(DemuxSignal::Complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Signal;
    use bytes::Bytes;
    use vodstream_media::{ChannelTag, ParsedManifest, Playlist, SegmentDescriptor};

    fn segment() -> Segment {
        let mut playlist = Playlist::new();
        playlist.merge_manifest(&ParsedManifest {
            segments: vec![SegmentDescriptor {
                url: "http://cdn/seg0.ts".into(),
                start_ms: 5000,
                duration_ms: 5000,
                sequence: 1,
            }],
            ..Default::default()
        });
        playlist.lookup(5000).cloned().unwrap()
    }

    #[test]
    fn test_emits_metadata_once_then_complete() {
        let mut demuxer = PassthroughDemuxer::new().with_codec("avc1");
        let mut input = BufferChannel::new(ChannelTag::Segment);
        let mut tracks = TrackSet::new();
        let emitter = Emitter::new();
        let seg = segment();

        input.append(Bytes::from_static(b"one"));
        demuxer.demux(&seg, &mut input, &mut tracks, &emitter);
        input.append(Bytes::from_static(b"two"));
        demuxer.demux(&seg, &mut input, &mut tracks, &emitter);

        let signals: Vec<Signal> = std::iter::from_fn(|| emitter.pop()).collect();
        assert_eq!(
            signals,
            vec![
                Signal::Demux(DemuxSignal::MetadataParsed(TrackKind::Video)),
                Signal::Demux(DemuxSignal::Complete),
                Signal::Demux(DemuxSignal::Complete),
            ]
        );
        assert_eq!(tracks.video.samples.len(), 2);
        assert_eq!(tracks.video.samples[0].pts_ms, 5000);
        assert_eq!(tracks.video.meta.as_ref().unwrap().codec.as_deref(), Some("avc1"));
        assert!(input.is_empty());
    }

    #[test]
    fn test_empty_input_is_non_fatal_error() {
        let mut demuxer = PassthroughDemuxer::new();
        let mut input = BufferChannel::new(ChannelTag::Segment);
        let mut tracks = TrackSet::new();
        let emitter = Emitter::new();

        demuxer.demux(&segment(), &mut input, &mut tracks, &emitter);

        match emitter.pop() {
            Some(Signal::Demux(DemuxSignal::Error { fatal, .. })) => {
                assert_eq!(fatal, Some(false))
            }
            other => panic!("unexpected signal: {:?}", other),
        }
        assert_eq!(tracks.sample_count(), 0);
    }
}
