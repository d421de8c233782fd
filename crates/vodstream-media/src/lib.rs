//! Vodstream-Media: segment state, byte channels, playlists and decryption.
//!
//! This crate holds the data-side building blocks of the VOD pipeline. None
//! of it performs network I/O; the orchestrator in the `vodstream` crate
//! owns every value created here.
//!
//! # Modules
//!
//! - `playlist` - Segment registry keyed by presentation start time
//! - `channel` - Named byte-accumulating channels filled by loaders
//! - `hls` - M3U8 media playlist model, parser and renderer
//! - `crypto` - Segment decryption primitive (AES-128-CBC)
//!
//! # Data flow
//!
//! 1. Manifest bytes land in the manifest channel and are parsed by `hls`
//! 2. The parsed descriptors are merged into the `Playlist` registry
//! 3. Segment bytes land in the segment channel (or the decrypt-input
//!    channel, and are decrypted into the segment channel via `crypto`)
//! 4. The registry tracks which segments are downloading or downloaded

pub mod channel;
pub mod crypto;
pub mod error;
pub mod hls;
pub mod playlist;

pub use channel::{BufferChannel, ChannelHandle, ChannelTag};
pub use crypto::{Aes128Cbc, Cipher, EncryptionMethod};
pub use error::{Error, Result};
pub use hls::MediaPlaylist;
pub use playlist::{EncryptInfo, ParsedManifest, Playlist, Segment, SegmentDescriptor};
