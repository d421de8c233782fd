//! HLS media playlists.
//!
//! Parses M3U8 media playlists into [`MediaPlaylist`], renders them back to
//! text, and converts them to the registry's [`ParsedManifest`](crate::ParsedManifest).

mod parser;
mod playlist;

pub use parser::parse_media_playlist;
pub use playlist::{KeyTag, MediaPlaylist, PlaylistType, SegmentEntry};
