//! Playback orchestration core.
//!
//! The [`Orchestrator`] owns the segment registry, the byte channels and
//! every collaborator handle. It reacts to loader, demux, remux and decrypt
//! signals, decides what to fetch next, and turns playback events (time
//! update, waiting, seek) into pipeline actions.
//!
//! All state is single-writer: only methods on this type mutate it, and
//! every public entry point drains the signal queue before returning.

mod preload;
mod stall;

use std::sync::Arc;
use url::Url;

use vodstream_common::{ErrorKind, HlsError, LoaderId, SessionId, TrackKind};
use vodstream_media::channel::channel;
use vodstream_media::{ChannelHandle, ChannelTag, Playlist};

use crate::config::PlayerConfig;
use crate::decrypt::{DecryptConfig, Decryptor};
use crate::demux::{Demuxer, TrackSet};
use crate::events::{
    DecryptSignal, DemuxSignal, Emitter, EventBus, LoaderSignal, PlayerEvent, RemuxSignal, Signal,
};
use crate::loader::{Loader, LoaderFactory};
use crate::manifest::ManifestParser;
use crate::playback::Playback;
use crate::remux::{PreSource, Remuxer};
use crate::sink::MediaSink;

pub(crate) use preload::secs_to_ms;

/// Collaborators handed to the orchestrator at construction.
pub struct Components {
    pub loaders: Box<dyn LoaderFactory>,
    pub parser: Box<dyn ManifestParser>,
    pub demuxer: Box<dyn Demuxer>,
    pub remuxer: Box<dyn Remuxer>,
    pub sink: Box<dyn MediaSink>,
    pub playback: Box<dyn Playback>,
}

/// A loader together with the channel it writes into.
struct Slot {
    tag: ChannelTag,
    loader: Box<dyn Loader>,
    channel: ChannelHandle,
}

impl Slot {
    fn new(loaders: &mut dyn LoaderFactory, tag: ChannelTag, channel: ChannelHandle) -> Self {
        Self {
            tag,
            loader: loaders.create(tag, channel.clone()),
            channel,
        }
    }

    /// Replace the loader with a fresh instance on the same binding.
    fn renew(&mut self, loaders: &mut dyn LoaderFactory) {
        self.loader.destroy();
        self.loader = loaders.create(self.tag, self.channel.clone());
    }

    fn owns(&self, signal: &LoaderSignal) -> bool {
        self.tag == signal.tag() && self.loader.id() == signal.loader()
    }
}

pub struct Orchestrator {
    config: PlayerConfig,
    session: SessionId,
    events: Arc<EventBus>,
    emitter: Emitter,

    loaders: Box<dyn LoaderFactory>,
    parser: Box<dyn ManifestParser>,
    demuxer: Box<dyn Demuxer>,
    remuxer: Box<dyn Remuxer>,
    sink: Box<dyn MediaSink>,
    playback: Box<dyn Playback>,

    playlist: Playlist,
    tracks: TrackSet,
    presource: PreSource,

    manifest: Slot,
    /// Demux input. Segment bytes land here directly, or via the decryptor.
    segment_channel: ChannelHandle,
    /// Segment fetches; bound to the decrypt-input channel once a key is needed.
    segment: Slot,
    key: Option<Slot>,
    decryptor: Option<Decryptor>,

    url: Option<String>,
    base_url: Option<Url>,
    manifest_text: Option<String>,
    retries: u32,
    preload_time: Option<f64>,
    last_seek_time: Option<f64>,
    ended: bool,
}

impl Orchestrator {
    pub fn new(config: PlayerConfig, components: Components, events: Arc<EventBus>) -> Self {
        let Components {
            mut loaders,
            parser,
            demuxer,
            remuxer,
            sink,
            playback,
        } = components;

        let manifest = Slot::new(loaders.as_mut(), ChannelTag::Manifest, channel(ChannelTag::Manifest));
        let segment_channel = channel(ChannelTag::Segment);
        let segment = Slot::new(loaders.as_mut(), ChannelTag::Segment, segment_channel.clone());

        Self {
            retries: config.retry_times,
            config,
            session: SessionId::new(),
            events,
            emitter: Emitter::new(),
            loaders,
            parser,
            demuxer,
            remuxer,
            sink,
            playback,
            playlist: Playlist::new(),
            tracks: TrackSet::new(),
            presource: PreSource::new(),
            manifest,
            segment_channel,
            segment,
            key: None,
            decryptor: None,
            url: None,
            base_url: None,
            manifest_text: None,
            preload_time: None,
            last_seek_time: None,
            ended: false,
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Start loading the manifest at `url`.
    pub fn load(&mut self, url: &str) {
        tracing::info!(session = %self.session, url, "Loading manifest");
        self.url = Some(url.to_string());
        self.base_url = self.parser.resolve_base_url(url);
        self.manifest.loader.start(url);
        self.drain();
    }

    /// Deliver a signal raised outside the orchestrator's call stack, such as
    /// a loader completion arriving from the network task.
    pub fn handle(&mut self, signal: Signal) {
        self.dispatch(signal);
        self.drain();
    }

    /// Playback position advanced.
    pub fn on_time_update(&mut self) {
        self.realign_to_buffer();
        let now = self.playback.current_time();
        self.preload(now);
        self.drain();
    }

    /// Playback stalled for lack of data.
    pub fn on_waiting(&mut self) {
        self.check_end_of_stream();
        self.drain();
    }

    /// Seek to `time_secs`.
    ///
    /// The playback layer moves its own position; this only resets the
    /// pipeline when the target lies outside every buffered range.
    pub fn seek(&mut self, time_secs: f64) {
        if self.sink.buffered_ranges().contains(time_secs) {
            tracing::debug!(time_secs, "Seek inside buffered range");
            return;
        }

        tracing::info!(time_secs, "Seek outside buffered ranges; resetting pipeline");
        self.last_seek_time = Some(time_secs);
        self.ended = false;

        self.segment.renew(self.loaders.as_mut());
        self.tracks.clear_samples();
        self.presource.clear_queues();
        self.remuxer.reset_compatibility();
        self.segment_channel.lock().reset();
        if self.segment.tag == ChannelTag::DecryptInput {
            self.segment.channel.lock().reset();
        }
        self.playlist.clear_downloaded();

        self.demuxer.seek(time_secs);
        self.remuxer.seek(time_secs);
        self.sink.seek(time_secs);

        self.preload(time_secs);
        self.drain();
    }

    /// Tear the session down: abandon fetches, drop buffered bytes and
    /// registry state, and restore counters. The orchestrator can `load`
    /// again afterwards.
    pub fn destroy(&mut self) {
        tracing::info!(session = %self.session, "Destroying session");

        self.manifest.loader.destroy();
        self.segment.loader.destroy();
        if let Some(mut key) = self.key.take() {
            key.loader.destroy();
        }
        self.decryptor = None;

        self.manifest.channel.lock().reset();
        self.segment_channel.lock().reset();
        self.manifest.renew(self.loaders.as_mut());
        self.segment = Slot::new(
            self.loaders.as_mut(),
            ChannelTag::Segment,
            self.segment_channel.clone(),
        );

        self.playlist.clear();
        self.tracks = TrackSet::new();
        self.presource = PreSource::new();
        self.emitter.clear();

        self.url = None;
        self.base_url = None;
        self.manifest_text = None;
        self.retries = self.config.retry_times;
        self.preload_time = None;
        self.last_seek_time = None;
        self.ended = false;
        self.session = SessionId::new();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    pub fn presource(&self) -> &PreSource {
        &self.presource
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Effective lookahead, known once a manifest has loaded.
    pub fn preload_time(&self) -> Option<f64> {
        self.preload_time
    }

    pub fn last_seek_time(&self) -> Option<f64> {
        self.last_seek_time
    }

    /// Raw text of the last manifest received.
    pub fn manifest_text(&self) -> Option<&str> {
        self.manifest_text.as_deref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn segment_loader_id(&self) -> LoaderId {
        self.segment.loader.id()
    }

    /// Channel the segment loader currently writes into.
    pub fn segment_loader_tag(&self) -> ChannelTag {
        self.segment.tag
    }

    pub fn has_decryptor(&self) -> bool {
        self.decryptor.is_some()
    }

    pub fn sink(&self) -> &dyn MediaSink {
        self.sink.as_ref()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Signal dispatch
    // -----------------------------------------------------------------------

    fn drain(&mut self) {
        while let Some(signal) = self.emitter.pop() {
            self.dispatch(signal);
        }
    }

    fn dispatch(&mut self, signal: Signal) {
        match signal {
            Signal::Loader(signal) => self.on_loader_signal(signal),
            Signal::Demux(signal) => self.on_demux_signal(signal),
            Signal::Remux(signal) => self.on_remux_signal(signal),
            Signal::Decrypt(DecryptSignal::Decrypted { url }) => self.demux_segment(&url),
        }
    }

    fn on_loader_signal(&mut self, signal: LoaderSignal) {
        let slot = if self.manifest.owns(&signal) {
            &mut self.manifest
        } else if self.segment.owns(&signal) {
            &mut self.segment
        } else if let Some(key) = self.key.as_mut().filter(|k| k.owns(&signal)) {
            key
        } else {
            tracing::debug!(
                loader = %signal.loader(),
                tag = %signal.tag(),
                "Ignoring result from a replaced loader"
            );
            return;
        };
        slot.loader.finish();

        match signal {
            LoaderSignal::Complete { tag, url, .. } => match tag {
                ChannelTag::Manifest => self.on_manifest_loaded(),
                ChannelTag::Segment => self.on_segment_loaded(&url),
                ChannelTag::DecryptInput => self.on_ciphertext_loaded(&url),
                ChannelTag::Key => self.on_key_loaded(),
            },
            LoaderSignal::Error {
                tag, url, message, ..
            } => self.on_load_error(tag, &url, &message),
        }
    }

    fn on_demux_signal(&mut self, signal: DemuxSignal) {
        match signal {
            DemuxSignal::MetadataParsed(kind) => {
                let duration_ms = self.playlist.duration_ms();
                if let Some(meta) = self.tracks.get_mut(kind).meta.as_mut() {
                    meta.duration_ms = duration_ms;
                }
                self.remuxer
                    .remux_metadata(kind, &self.tracks, &mut self.presource, &self.emitter);
            }
            DemuxSignal::Complete => {
                self.remuxer
                    .remux_media(&mut self.tracks, &mut self.presource, &self.emitter);
            }
            DemuxSignal::Sei(payload) => {
                self.events.broadcast(PlayerEvent::SeiParsed {
                    payload: payload.to_vec(),
                });
            }
            DemuxSignal::Error {
                module,
                message,
                fatal,
            } => self.report(ErrorKind::Demux, &module, message, fatal.unwrap_or(true)),
        }
    }

    fn on_remux_signal(&mut self, signal: RemuxSignal) {
        match signal {
            RemuxSignal::InitSegment(kind) => {
                tracing::debug!(track = %kind, "Init segment ready");
                if let Err(e) = self.sink.add_source_endpoints(&self.presource) {
                    self.report(ErrorKind::SinkAppend, "sink", e, true);
                }
            }
            RemuxSignal::MediaSegment(kind) => self.append_media(kind),
            RemuxSignal::Error {
                module,
                message,
                fatal,
            } => self.report(ErrorKind::Remux, &module, message, fatal.unwrap_or(true)),
        }
    }

    fn append_media(&mut self, kind: TrackKind) {
        if !self.sink.has_endpoints() {
            if let Err(e) = self.sink.add_source_endpoints(&self.presource) {
                self.report(ErrorKind::SinkAppend, "sink", e, true);
                return;
            }
        }
        match self.sink.append(&mut self.presource) {
            Ok(0) => {}
            Ok(written) => {
                let buffered_end = self
                    .sink
                    .buffered_ranges()
                    .last()
                    .map_or(0.0, |r| r.end);
                tracing::debug!(track = %kind, written, buffered_end, "Appended media");
                self.events.broadcast(PlayerEvent::SegmentAppended { kind, buffered_end });
            }
            Err(e) => self.report(ErrorKind::SinkAppend, "sink", e, true),
        }
    }

    // -----------------------------------------------------------------------
    // Loader completions
    // -----------------------------------------------------------------------

    fn on_manifest_loaded(&mut self) {
        let bytes = self.manifest.channel.lock().shift();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let parsed = self.parser.parse(&text, self.base_url.as_ref());
        self.manifest_text = Some(text);

        let manifest = match parsed {
            Ok(manifest) => manifest,
            Err(e) => {
                self.report(ErrorKind::ManifestParse, "playlist", e, false);
                return;
            }
        };

        self.playlist.merge_manifest(&manifest);
        tracing::info!(
            segments = self.playlist.len(),
            duration_ms = self.playlist.duration_ms(),
            target_duration_ms = self.playlist.target_duration_ms(),
            "Manifest loaded"
        );
        self.events.broadcast(PlayerEvent::ManifestLoaded {
            segments: self.playlist.len(),
            duration_ms: self.playlist.duration_ms(),
        });

        if self.preload_time.is_none() {
            let target = self.playlist.target_duration_ms();
            let preload = self.config.preload_time_secs.unwrap_or(if target > 0 {
                target as f64 / 1000.0
            } else {
                self.config.fallback_preload_secs
            });
            tracing::debug!(preload_secs = preload, "Preload window set");
            self.preload_time = Some(preload);
        }

        let key_uri = self
            .playlist
            .encrypt()
            .filter(|e| e.needs_key())
            .and_then(|e| e.uri.clone());
        if let Some(uri) = key_uri {
            if self.key.is_none() {
                self.start_key_fetch(&uri);
                return;
            }
            if self.decryptor.is_none() {
                return;
            }
        }

        self.start_at_current_position();
    }

    /// Begin fetching at the playback position, or retry the manifest when
    /// the registry has nothing there.
    ///
    /// The retry counter is only restored once a segment is available, so
    /// a manifest that never covers the position is fetched at most
    /// `retry_times` times.
    fn start_at_current_position(&mut self) {
        let now = self.playback.current_time();
        if self.playlist.lookup(secs_to_ms(now)).is_none() {
            if self.retries == 0 {
                tracing::debug!(time_secs = now, "No segment at playback position; not retrying");
                return;
            }
            self.retries -= 1;
            tracing::warn!(
                time_secs = now,
                retries = self.retries,
                "No segment at playback position"
            );
            if self.retries == 0 {
                self.retry_budget_exceeded(format!("no segment at {now}s"));
            } else if let Some(url) = self.url.clone() {
                self.manifest.loader.start(&url);
            }
            return;
        }
        self.reset_retries();
        self.preload(now);
    }

    fn start_key_fetch(&mut self, uri: &str) {
        tracing::info!(uri, "Stream is encrypted; fetching key");

        let decrypt_input = channel(ChannelTag::DecryptInput);
        self.segment.loader.destroy();
        self.segment = Slot::new(self.loaders.as_mut(), ChannelTag::DecryptInput, decrypt_input);

        let mut key = Slot::new(self.loaders.as_mut(), ChannelTag::Key, channel(ChannelTag::Key));
        key.loader.start(uri);
        self.key = Some(key);
    }

    fn on_key_loaded(&mut self) {
        let Some(key_bytes) = self.key.as_ref().map(|k| k.channel.lock().shift()) else {
            return;
        };
        self.playlist.set_key(key_bytes.clone());

        let Some(encrypt) = self.playlist.encrypt().cloned() else {
            tracing::warn!("Key arrived for a stream without an encryption record");
            return;
        };

        let config = DecryptConfig {
            key: key_bytes,
            iv: encrypt.iv,
            method: encrypt.method,
        };
        match Decryptor::new(
            config,
            self.segment.channel.clone(),
            self.segment_channel.clone(),
            self.emitter.clone(),
        ) {
            Ok(decryptor) => self.decryptor = Some(decryptor),
            Err(e) => {
                self.report(ErrorKind::Decrypt, "decryptor", e, true);
                return;
            }
        }

        tracing::info!("Key loaded; decryptor ready");
        self.reset_retries();
        self.start_at_current_position();
    }

    fn on_segment_loaded(&mut self, url: &str) {
        tracing::debug!(url, "Segment loaded");
        self.playlist.mark_downloaded(url);
        self.reset_retries();
        self.demux_segment(url);
        self.drain();

        let now = self.playback.current_time();
        self.preload(now);
    }

    fn on_ciphertext_loaded(&mut self, url: &str) {
        tracing::debug!(url, "Encrypted segment loaded");
        self.playlist.mark_downloaded(url);
        self.reset_retries();

        let segment = self.playlist.get(url).cloned();
        match (self.decryptor.as_mut(), segment) {
            (Some(decryptor), Some(segment)) => {
                if let Err(e) = decryptor.decrypt(&segment) {
                    self.report(ErrorKind::Decrypt, "decryptor", e, true);
                }
            }
            (None, _) => {
                self.segment.channel.lock().reset();
                self.report(ErrorKind::Decrypt, "decryptor", "segment arrived before key", true);
            }
            (_, None) => {
                tracing::debug!(url, "Dropping ciphertext for segment no longer in registry");
                self.segment.channel.lock().reset();
            }
        }
        self.drain();

        let now = self.playback.current_time();
        self.preload(now);
    }

    fn demux_segment(&mut self, url: &str) {
        let Some(segment) = self.playlist.get(url).cloned() else {
            tracing::debug!(url, "Dropping bytes for segment no longer in registry");
            self.segment_channel.lock().reset();
            return;
        };
        let mut input = self.segment_channel.lock();
        self.demuxer
            .demux(&segment, &mut input, &mut self.tracks, &self.emitter);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    fn on_load_error(&mut self, tag: ChannelTag, url: &str, message: &str) {
        let kind = match tag {
            ChannelTag::Manifest => ErrorKind::ManifestLoad,
            ChannelTag::Segment | ChannelTag::DecryptInput => ErrorKind::SegmentLoad,
            ChannelTag::Key => ErrorKind::KeyLoad,
        };
        self.report(kind, "loader", format!("{url}: {message}"), true);
        self.retries = self.retries.saturating_sub(1);

        if matches!(tag, ChannelTag::Segment | ChannelTag::DecryptInput) {
            self.playlist.mark_failed(url);
        }

        if self.retries == 0 {
            self.retry_budget_exceeded(format!("{url} failed to load"));
            return;
        }

        tracing::warn!(tag = %tag, url, retries = self.retries, "Retrying load");
        match tag {
            ChannelTag::Manifest => self.manifest.loader.start(url),
            ChannelTag::Key => {
                if let Some(key) = self.key.as_mut() {
                    key.loader.start(url);
                }
            }
            ChannelTag::Segment | ChannelTag::DecryptInput => {
                let now = self.playback.current_time();
                self.preload(now);
            }
        }
    }

    fn reset_retries(&mut self) {
        self.retries = self.config.retry_times;
    }

    fn retry_budget_exceeded(&self, reason: String) {
        tracing::error!(%reason, "Retry budget exhausted");
        self.events.broadcast(PlayerEvent::RetryBudgetExceeded);
        self.report(
            ErrorKind::RetryBudgetExceeded,
            "loader",
            format!("giving up after {} attempts: {reason}", self.config.retry_times),
            true,
        );
    }

    /// Normalize and surface an error to the playback layer.
    fn report(&self, kind: ErrorKind, module: &str, message: impl std::fmt::Display, fatal: bool) {
        let error = HlsError::new(kind, module, message, fatal);
        if fatal {
            tracing::error!(kind = %kind, details = %error.details, "Pipeline error");
        } else {
            tracing::warn!(kind = %kind, details = %error.details, "Pipeline error");
        }
        self.events.broadcast(PlayerEvent::Error(error));
    }
}
