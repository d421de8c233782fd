//! Named byte-accumulating channels.
//!
//! Loaders append downloaded chunks to a channel; the consumer (demuxer,
//! decryptor or manifest parser) drains it with [`BufferChannel::shift`].

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Which channel a loader writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTag {
    Manifest,
    Segment,
    Key,
    DecryptInput,
}

impl ChannelTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Segment => "segment",
            Self::Key => "key",
            Self::DecryptInput => "decrypt-input",
        }
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a channel. Loader tasks append, the orchestrator drains.
pub type ChannelHandle = Arc<Mutex<BufferChannel>>;

/// Create a fresh shared channel.
pub fn channel(tag: ChannelTag) -> ChannelHandle {
    Arc::new(Mutex::new(BufferChannel::new(tag)))
}

/// FIFO of byte chunks with a running length and consumed offset.
#[derive(Debug)]
pub struct BufferChannel {
    tag: ChannelTag,
    chunks: VecDeque<Bytes>,
    length: usize,
    offset: u64,
}

impl BufferChannel {
    pub fn new(tag: ChannelTag) -> Self {
        Self {
            tag,
            chunks: VecDeque::new(),
            length: 0,
            offset: 0,
        }
    }

    pub fn tag(&self) -> ChannelTag {
        self.tag
    }

    pub fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.length += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Take every buffered byte as one contiguous buffer.
    pub fn shift(&mut self) -> Bytes {
        let taken = match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.pop_front().unwrap_or_default(),
            _ => {
                let mut out = BytesMut::with_capacity(self.length);
                for chunk in self.chunks.drain(..) {
                    out.extend_from_slice(&chunk);
                }
                out.freeze()
            }
        };
        self.offset += taken.len() as u64;
        self.length = 0;
        taken
    }

    /// Buffered, unconsumed byte count.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Total bytes consumed since the last reset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Drop buffered bytes and rewind the offset.
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.length = 0;
        self.offset = 0;
    }
}
