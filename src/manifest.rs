//! Manifest parser contract and the M3U8 implementation.

use url::Url;

use vodstream_media::hls::parse_media_playlist;
use vodstream_media::{ParsedManifest, Result};

pub trait ManifestParser: Send {
    /// Parse manifest text. Relative URIs resolve against `base_url`.
    fn parse(&self, text: &str, base_url: Option<&Url>) -> Result<ParsedManifest>;

    /// Base URL for a manifest fetched from `url`.
    fn resolve_base_url(&self, url: &str) -> Option<Url>;
}

/// HLS media playlist parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct M3u8Parser;

impl ManifestParser for M3u8Parser {
    fn parse(&self, text: &str, base_url: Option<&Url>) -> Result<ParsedManifest> {
        Ok(parse_media_playlist(text, base_url)?.to_manifest())
    }

    fn resolve_base_url(&self, url: &str) -> Option<Url> {
        // Joining with "." drops the last path segment and any query.
        Url::parse(url).and_then(|u| u.join(".")).ok()
    }
}
