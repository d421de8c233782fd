//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], which wires an [`Orchestrator`] to scripted loaders,
//! a recording sink, a manual playback clock and recording demux/remux
//! wrappers. Tests drive the orchestrator by completing or failing the
//! fetches it starts.

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

use vodstream::config::PlayerConfig;
use vodstream::demux::{Demuxer, PassthroughDemuxer, TrackSet};
use vodstream::events::{Emitter, EventBus, LoaderSignal, PlayerEvent, Signal};
use vodstream::loader::{Loader, LoaderFactory};
use vodstream::manifest::{M3u8Parser, ManifestParser};
use vodstream::orchestrator::{Components, Orchestrator};
use vodstream::playback::Playback;
use vodstream::remux::{PassthroughRemuxer, PreSource, Remuxer};
use vodstream::sink::MediaSink;
use vodstream_common::{LoaderId, Result, TimeRanges, TrackKind};
use vodstream_media::{
    BufferChannel, ChannelHandle, ChannelTag, ParsedManifest, Segment, SegmentDescriptor,
};

pub const MANIFEST_URL: &str = "http://cdn.test/vod/index.m3u8";

/// Segment URL as the parser resolves it against [`MANIFEST_URL`].
pub fn segment_url(index: usize) -> String {
    format!("http://cdn.test/vod/seg{index}.ts")
}

/// VOD playlist of `count` segments, each `duration` seconds long.
pub fn vod_manifest(count: usize, duration: u32) -> String {
    let mut text = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{duration}\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n"
    );
    for i in 0..count {
        text.push_str(&format!("#EXTINF:{duration}.000,\nseg{i}.ts\n"));
    }
    text.push_str("#EXT-X-ENDLIST\n");
    text
}

/// Same as [`vod_manifest`] with an AES-128 key and no explicit IV.
pub fn encrypted_manifest(count: usize, duration: u32) -> String {
    vod_manifest(count, duration).replacen(
        "#EXT-X-PLAYLIST-TYPE:VOD\n",
        "#EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n",
        1,
    )
}

/// Registry input with segments at arbitrary start times, for layouts a
/// media playlist cannot express (gaps between segments).
pub fn manifest_with_starts(starts_ms: &[u64], duration_ms: u64) -> ParsedManifest {
    let segments: Vec<_> = starts_ms
        .iter()
        .enumerate()
        .map(|(i, &start_ms)| SegmentDescriptor {
            url: segment_url(i),
            start_ms,
            duration_ms,
            sequence: i as u64,
        })
        .collect();
    ParsedManifest {
        duration_ms: segments.iter().map(|s| s.start_ms + s.duration_ms).max().unwrap_or(0),
        target_duration_ms: duration_ms,
        segments,
        encrypt: None,
        ended: true,
    }
}

/// Parser that ignores the manifest text and always yields the same result.
pub struct FixedParser(pub ParsedManifest);

impl ManifestParser for FixedParser {
    fn parse(&self, _text: &str, _base_url: Option<&Url>) -> vodstream_media::Result<ParsedManifest> {
        Ok(self.0.clone())
    }

    fn resolve_base_url(&self, url: &str) -> Option<Url> {
        Url::parse(url).ok()
    }
}

// ---------------------------------------------------------------------------
// Scripted loaders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoaderRecord {
    pub id: LoaderId,
    pub tag: ChannelTag,
    pub channel: ChannelHandle,
    pub starts: Vec<String>,
    pub destroyed: bool,
    pub loading: bool,
}

/// Every loader the factory created, in creation order.
#[derive(Debug, Clone, Default)]
pub struct LoaderLog(Arc<Mutex<Vec<LoaderRecord>>>);

impl LoaderLog {
    pub fn records(&self) -> Vec<LoaderRecord> {
        self.0.lock().clone()
    }

    /// Most recently created loader for `tag`.
    pub fn latest(&self, tag: ChannelTag) -> Option<LoaderRecord> {
        self.0.lock().iter().rev().find(|r| r.tag == tag).cloned()
    }

    pub fn created(&self, tag: ChannelTag) -> usize {
        self.0.lock().iter().filter(|r| r.tag == tag).count()
    }

    /// URLs started on any loader for `tag`, in order.
    pub fn starts(&self, tag: ChannelTag) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter(|r| r.tag == tag)
            .flat_map(|r| r.starts.clone())
            .collect()
    }

    /// Every start across all loaders as `(tag, url)`, grouped by loader.
    pub fn start_order(&self) -> Vec<(ChannelTag, String)> {
        let records = self.0.lock();
        let mut order = Vec::new();
        for record in records.iter() {
            for url in &record.starts {
                order.push((record.tag, url.clone()));
            }
        }
        order
    }

    fn update(&self, id: LoaderId, f: impl FnOnce(&mut LoaderRecord)) {
        if let Some(record) = self.0.lock().iter_mut().find(|r| r.id == id) {
            f(record);
        }
    }
}

pub struct ScriptedLoader {
    id: LoaderId,
    log: LoaderLog,
    url: Option<String>,
    loading: bool,
    destroyed: bool,
}

impl Loader for ScriptedLoader {
    fn id(&self) -> LoaderId {
        self.id
    }

    fn start(&mut self, url: &str) {
        if self.destroyed {
            return;
        }
        self.loading = true;
        self.url = Some(url.to_string());
        let url = url.to_string();
        self.log.update(self.id, |r| {
            r.starts.push(url);
            r.loading = true;
        });
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.loading = false;
        self.log.update(self.id, |r| {
            r.destroyed = true;
            r.loading = false;
        });
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn finish(&mut self) {
        self.loading = false;
        self.log.update(self.id, |r| r.loading = false);
    }
}

pub struct ScriptedLoaderFactory {
    log: LoaderLog,
}

impl LoaderFactory for ScriptedLoaderFactory {
    fn create(&mut self, tag: ChannelTag, channel: ChannelHandle) -> Box<dyn Loader> {
        let id = LoaderId::new();
        self.log.0.lock().push(LoaderRecord {
            id,
            tag,
            channel,
            starts: Vec::new(),
            destroyed: false,
            loading: false,
        });
        Box::new(ScriptedLoader {
            id,
            log: self.log.clone(),
            url: None,
            loading: false,
            destroyed: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Sink and playback
// ---------------------------------------------------------------------------

/// Sink that keeps everything in memory.
///
/// With `auto_buffer` set, appended fragments extend the buffered ranges;
/// otherwise tests set `buffered` directly.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub auto_buffer: bool,
    pub buffered: TimeRanges,
    pub endpoints: Vec<TrackKind>,
    pub appended: Vec<(TrackKind, f64, f64)>,
    pub payloads: Vec<Bytes>,
    pub end_of_stream_calls: usize,
    pub seeks: Vec<f64>,
    pub fail_append: bool,
}

impl MediaSink for RecordingSink {
    fn add_source_endpoints(&mut self, source: &PreSource) -> Result<()> {
        for kind in source.initialized() {
            if !self.endpoints.contains(&kind) {
                self.endpoints.push(kind);
            }
        }
        Ok(())
    }

    fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }

    fn append(&mut self, source: &mut PreSource) -> Result<usize> {
        if self.fail_append {
            return Err(vodstream_common::Error::internal("quota exceeded"));
        }
        let mut written = 0;
        for kind in self.endpoints.clone() {
            while let Some(fragment) = source.get_mut(kind).fragments.pop_front() {
                if self.auto_buffer {
                    self.buffered.add(fragment.start, fragment.end);
                }
                self.appended.push((kind, fragment.start, fragment.end));
                self.payloads.push(fragment.data);
                written += 1;
            }
        }
        Ok(written)
    }

    fn end_of_stream(&mut self) {
        self.end_of_stream_calls += 1;
    }

    fn buffered_ranges(&self) -> TimeRanges {
        self.buffered.clone()
    }

    fn seek(&mut self, time_secs: f64) {
        self.seeks.push(time_secs);
    }
}

#[derive(Debug, Default)]
pub struct ManualPlayback {
    pub time: f64,
    /// Positions set by the orchestrator.
    pub realigned: Vec<f64>,
}

impl Playback for ManualPlayback {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, secs: f64) {
        self.time = secs;
        self.realigned.push(secs);
    }
}

// ---------------------------------------------------------------------------
// Recording demux/remux
// ---------------------------------------------------------------------------

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingDemuxer {
    inner: PassthroughDemuxer,
    calls: CallLog,
}

impl Demuxer for RecordingDemuxer {
    fn demux(
        &mut self,
        segment: &Segment,
        input: &mut BufferChannel,
        tracks: &mut TrackSet,
        emitter: &Emitter,
    ) {
        self.calls.lock().push(format!("demux {}", segment.url));
        self.inner.demux(segment, input, tracks, emitter);
    }

    fn seek(&mut self, time_secs: f64) {
        self.calls.lock().push(format!("demux seek {time_secs}"));
    }
}

pub struct RecordingRemuxer {
    inner: PassthroughRemuxer,
    calls: CallLog,
}

impl Remuxer for RecordingRemuxer {
    fn remux_metadata(
        &mut self,
        kind: TrackKind,
        tracks: &TrackSet,
        out: &mut PreSource,
        emitter: &Emitter,
    ) {
        self.calls.lock().push(format!("remux metadata {kind}"));
        self.inner.remux_metadata(kind, tracks, out, emitter);
    }

    fn remux_media(&mut self, tracks: &mut TrackSet, out: &mut PreSource, emitter: &Emitter) {
        self.calls.lock().push("remux media".to_string());
        self.inner.remux_media(tracks, out, emitter);
    }

    fn reset_compatibility(&mut self) {
        self.calls.lock().push("remux reset".to_string());
        self.inner.reset_compatibility();
    }

    fn seek(&mut self, time_secs: f64) {
        self.calls.lock().push(format!("remux seek {time_secs}"));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orch: Orchestrator,
    pub loaders: LoaderLog,
    pub sink: Arc<Mutex<RecordingSink>>,
    pub playback: Arc<Mutex<ManualPlayback>>,
    pub calls: CallLog,
    pub bus: Arc<EventBus>,
}

impl Harness {
    /// Sink buffers whatever is appended.
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default(), true)
    }

    /// Sink ranges are set by the test.
    pub fn manual_buffer() -> Self {
        Self::with_config(PlayerConfig::default(), false)
    }

    pub fn with_config(config: PlayerConfig, auto_buffer: bool) -> Self {
        Self::with_parser(config, auto_buffer, Box::new(M3u8Parser))
    }

    pub fn with_parser(
        config: PlayerConfig,
        auto_buffer: bool,
        parser: Box<dyn ManifestParser>,
    ) -> Self {
        let loaders = LoaderLog::default();
        let sink = Arc::new(Mutex::new(RecordingSink {
            auto_buffer,
            ..Default::default()
        }));
        let playback = Arc::new(Mutex::new(ManualPlayback::default()));
        let calls = CallLog::default();
        let bus = Arc::new(EventBus::default());

        let components = Components {
            loaders: Box::new(ScriptedLoaderFactory {
                log: loaders.clone(),
            }),
            parser,
            demuxer: Box::new(RecordingDemuxer {
                inner: PassthroughDemuxer::new(),
                calls: calls.clone(),
            }),
            remuxer: Box::new(RecordingRemuxer {
                inner: PassthroughRemuxer::new(),
                calls: calls.clone(),
            }),
            sink: Box::new(sink.clone()),
            playback: Box::new(playback.clone()),
        };
        let orch = Orchestrator::new(config, components, bus.clone());

        Self {
            orch,
            loaders,
            sink,
            playback,
            calls,
            bus,
        }
    }

    /// Load [`MANIFEST_URL`] and deliver `text` as its body.
    pub fn load_manifest(&mut self, text: &str) {
        self.orch.load(MANIFEST_URL);
        self.complete(ChannelTag::Manifest, text.as_bytes().to_vec());
    }

    /// Complete the in-flight fetch on the latest loader for `tag`.
    /// Returns the URL that was fetched.
    pub fn complete(&mut self, tag: ChannelTag, body: impl Into<Bytes>) -> String {
        let record = self
            .loaders
            .latest(tag)
            .unwrap_or_else(|| panic!("no {tag} loader"));
        let url = record
            .starts
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("{tag} loader never started"));
        self.complete_from(record.id, tag, &url, body);
        url
    }

    /// Deliver a completion as loader `id`, whether or not it is current.
    pub fn complete_from(&mut self, id: LoaderId, tag: ChannelTag, url: &str, body: impl Into<Bytes>) {
        // A replaced loader never writes into its channel.
        if let Some(record) = self
            .loaders
            .records()
            .into_iter()
            .find(|r| r.id == id && !r.destroyed)
        {
            record.channel.lock().append(body.into());
        }
        self.orch.handle(Signal::Loader(LoaderSignal::Complete {
            loader: id,
            tag,
            url: url.to_string(),
        }));
    }

    /// Fail the in-flight fetch on the latest loader for `tag`.
    pub fn fail(&mut self, tag: ChannelTag, message: &str) -> String {
        let record = self
            .loaders
            .latest(tag)
            .unwrap_or_else(|| panic!("no {tag} loader"));
        let url = record
            .starts
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("{tag} loader never started"));
        self.orch.handle(Signal::Loader(LoaderSignal::Error {
            loader: record.id,
            tag,
            url: url.clone(),
            message: message.to_string(),
        }));
        url
    }

    /// Complete the current segment fetch with a dummy payload.
    pub fn complete_segment(&mut self) -> String {
        self.complete(ChannelTag::Segment, Bytes::from_static(b"segment-payload"))
    }

    pub fn set_time(&self, secs: f64) {
        self.playback.lock().time = secs;
    }

    pub fn set_buffered(&self, ranges: &[(f64, f64)]) {
        self.sink.lock().buffered = TimeRanges::from_ranges(ranges.iter().copied());
    }

    /// Events broadcast so far, oldest first.
    pub fn events(&self) -> Vec<PlayerEvent> {
        let mut events = self.bus.recent_events(usize::MAX);
        events.reverse();
        events
    }

    pub fn count_events(&self, pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn segment_starts(&self) -> Vec<String> {
        self.loaders.starts(ChannelTag::Segment)
    }
}
