//! Typed signal bus and outbound player events.
//!
//! Collaborators (loaders, demuxer, remuxer, decryptor) report through an
//! [`Emitter`]. The orchestrator drains the queue synchronously before any of
//! its entry points return, so an emitted [`Signal`] is always handled before
//! control goes back to the caller.
//!
//! [`EventBus`] carries [`PlayerEvent`]s to the playback layer over a
//! `tokio::sync::broadcast` channel and keeps a bounded ring buffer of recent
//! events for late subscribers and diagnostics.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;

use vodstream_common::{HlsError, LoaderId, TrackKind};
use vodstream_media::ChannelTag;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Loader completion or failure for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderSignal {
    Complete {
        loader: LoaderId,
        tag: ChannelTag,
        url: String,
    },
    Error {
        loader: LoaderId,
        tag: ChannelTag,
        url: String,
        message: String,
    },
}

impl LoaderSignal {
    pub fn loader(&self) -> LoaderId {
        match self {
            Self::Complete { loader, .. } | Self::Error { loader, .. } => *loader,
        }
    }

    pub fn tag(&self) -> ChannelTag {
        match self {
            Self::Complete { tag, .. } | Self::Error { tag, .. } => *tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DemuxSignal {
    MetadataParsed(TrackKind),
    Complete,
    Sei(Bytes),
    Error {
        module: String,
        message: String,
        /// `None` means the demuxer did not say; treated as fatal.
        fatal: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemuxSignal {
    InitSegment(TrackKind),
    MediaSegment(TrackKind),
    Error {
        module: String,
        message: String,
        fatal: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptSignal {
    Decrypted { url: String },
}

/// Every signal a collaborator can raise toward the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Loader(LoaderSignal),
    Demux(DemuxSignal),
    Remux(RemuxSignal),
    Decrypt(DecryptSignal),
}

impl From<LoaderSignal> for Signal {
    fn from(s: LoaderSignal) -> Self {
        Self::Loader(s)
    }
}

impl From<DemuxSignal> for Signal {
    fn from(s: DemuxSignal) -> Self {
        Self::Demux(s)
    }
}

impl From<RemuxSignal> for Signal {
    fn from(s: RemuxSignal) -> Self {
        Self::Remux(s)
    }
}

impl From<DecryptSignal> for Signal {
    fn from(s: DecryptSignal) -> Self {
        Self::Decrypt(s)
    }
}

/// Handle collaborators use to queue signals for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    queue: Arc<Mutex<VecDeque<Signal>>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, signal: impl Into<Signal>) {
        self.queue.lock().push_back(signal.into());
    }

    pub(crate) fn pop(&self) -> Option<Signal> {
        self.queue.lock().pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.queue.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// PlayerEvent
// ---------------------------------------------------------------------------

/// Notification for the playback layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    Error(HlsError),
    RetryBudgetExceeded,
    Ended,
    SeiParsed { payload: Vec<u8> },
    ManifestLoaded { segments: usize, duration_ms: u64 },
    SegmentAppended { kind: TrackKind, buffered_end: f64 },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    recent: RwLock<VecDeque<PlayerEvent>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event and store it in the ring buffer.
    pub fn broadcast(&self, event: PlayerEvent) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<PlayerEvent> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
