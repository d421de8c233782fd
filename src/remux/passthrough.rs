//! Remuxer that forwards sample payloads unchanged.

use bytes::Bytes;
use std::collections::HashSet;

use vodstream_common::TrackKind;

use super::{Fragment, PreSource, Remuxer};
use crate::demux::TrackSet;
use crate::events::{Emitter, RemuxSignal};

#[derive(Debug, Default)]
pub struct PassthroughRemuxer {
    init: Option<Bytes>,
    mime: Option<String>,
    initialized: HashSet<TrackKind>,
    /// End of the last emitted fragment. Cleared by `reset_compatibility`.
    last_end_ms: Option<u64>,
}

impl PassthroughRemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Init segment handed to the sink.
    pub fn with_init(mut self, init: Bytes) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

impl Remuxer for PassthroughRemuxer {
    fn remux_metadata(
        &mut self,
        kind: TrackKind,
        tracks: &TrackSet,
        out: &mut PreSource,
        emitter: &Emitter,
    ) {
        if tracks.get(kind).meta.is_none() {
            emitter.emit(RemuxSignal::Error {
                module: "passthrough-remuxer".into(),
                message: format!("no metadata for {kind} track"),
                fatal: None,
            });
            return;
        }
        if !self.initialized.insert(kind) {
            return;
        }

        let buffer = out.get_mut(kind);
        buffer.init = Some(self.init.clone().unwrap_or_default());
        buffer.mime = self.mime.clone();
        emitter.emit(RemuxSignal::InitSegment(kind));
    }

    fn remux_media(&mut self, tracks: &mut TrackSet, out: &mut PreSource, emitter: &Emitter) {
        for kind in [TrackKind::Video, TrackKind::Audio] {
            let samples = std::mem::take(&mut tracks.get_mut(kind).samples);
            if samples.is_empty() {
                continue;
            }

            let buffer = out.get_mut(kind);
            for sample in samples {
                if let Some(last) = self.last_end_ms {
                    if sample.pts_ms < last {
                        tracing::debug!(
                            pts_ms = sample.pts_ms,
                            last_end_ms = last,
                            "Sample precedes previous output"
                        );
                    }
                }
                let end_ms = sample.pts_ms + sample.duration_ms;
                self.last_end_ms = Some(end_ms);
                buffer.fragments.push_back(Fragment {
                    data: sample.data,
                    start: sample.pts_ms as f64 / 1000.0,
                    end: end_ms as f64 / 1000.0,
                });
            }
            emitter.emit(RemuxSignal::MediaSegment(kind));
        }
    }

    fn reset_compatibility(&mut self) {
        self.last_end_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{Sample, TrackMeta};
    use crate::events::Signal;

    fn tracks_with_sample(pts_ms: u64) -> TrackSet {
        let mut tracks = TrackSet::new();
        tracks.video.meta = Some(TrackMeta::default());
        tracks.video.samples.push(Sample {
            dts_ms: pts_ms,
            pts_ms,
            duration_ms: 5000,
            keyframe: true,
            data: Bytes::from_static(b"payload"),
        });
        tracks
    }

    #[test]
    fn test_init_segment_once_per_track() {
        let mut remuxer = PassthroughRemuxer::new().with_init(Bytes::from_static(b"init"));
        let tracks = tracks_with_sample(0);
        let mut out = PreSource::new();
        let emitter = Emitter::new();

        remuxer.remux_metadata(TrackKind::Video, &tracks, &mut out, &emitter);
        remuxer.remux_metadata(TrackKind::Video, &tracks, &mut out, &emitter);

        assert_eq!(
            emitter.pop(),
            Some(Signal::Remux(RemuxSignal::InitSegment(TrackKind::Video)))
        );
        assert_eq!(emitter.pop(), None);
        assert_eq!(out.video.init.as_deref(), Some(&b"init"[..]));
        assert_eq!(out.initialized().collect::<Vec<_>>(), vec![TrackKind::Video]);
    }

    #[test]
    fn test_metadata_without_track_is_error() {
        let mut remuxer = PassthroughRemuxer::new();
        let emitter = Emitter::new();
        remuxer.remux_metadata(TrackKind::Audio, &TrackSet::new(), &mut PreSource::new(), &emitter);
        assert!(matches!(
            emitter.pop(),
            Some(Signal::Remux(RemuxSignal::Error { fatal: None, .. }))
        ));
    }

    #[test]
    fn test_media_moves_samples_to_fragments() {
        let mut remuxer = PassthroughRemuxer::new();
        let mut tracks = tracks_with_sample(5000);
        let mut out = PreSource::new();
        let emitter = Emitter::new();

        remuxer.remux_media(&mut tracks, &mut out, &emitter);

        assert_eq!(tracks.sample_count(), 0);
        let fragment = out.video.fragments.front().unwrap();
        assert_eq!(fragment.start, 5.0);
        assert_eq!(fragment.end, 10.0);
        assert_eq!(
            emitter.pop(),
            Some(Signal::Remux(RemuxSignal::MediaSegment(TrackKind::Video)))
        );
    }

    #[test]
    fn test_no_samples_no_signal() {
        let mut remuxer = PassthroughRemuxer::new();
        let emitter = Emitter::new();
        remuxer.remux_media(&mut TrackSet::new(), &mut PreSource::new(), &emitter);
        assert_eq!(emitter.pending(), 0);
    }
}
