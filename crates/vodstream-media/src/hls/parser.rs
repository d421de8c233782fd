//! M3U8 media playlist parser.

use url::Url;

use super::playlist::{KeyTag, MediaPlaylist, PlaylistType, SegmentEntry};
use crate::crypto::{parse_iv, EncryptionMethod};
use crate::error::{Error, Result};

/// Parse a media playlist.
///
/// Relative segment and key URIs are resolved against `base` when one
/// is given. Master playlists, byte-range segments and `#EXT-X-MAP` are
/// rejected as unsupported.
pub fn parse_media_playlist(text: &str, base: Option<&Url>) -> Result<MediaPlaylist> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    match lines.next() {
        Some((_, "#EXTM3U")) => {}
        Some((line, _)) => return Err(Error::invalid_playlist(line, "missing #EXTM3U header")),
        None => return Err(Error::invalid_playlist(0, "empty playlist")),
    }

    let mut playlist = MediaPlaylist {
        target_duration: 0,
        media_sequence: 0,
        playlist_type: PlaylistType::Live,
        segments: Vec::new(),
        ended: false,
    };

    let mut pending_duration: Option<(f64, Option<String>)> = None;
    let mut pending_discontinuity = false;
    let mut current_key: Option<KeyTag> = None;

    for (line_no, line) in lines {
        if let Some(rest) = line.strip_prefix('#') {
            let (tag, value) = rest.split_once(':').unwrap_or((rest, ""));
            match tag {
                "EXT-X-TARGETDURATION" => {
                    playlist.target_duration = parse_num(value, line_no, tag)?;
                }
                "EXT-X-MEDIA-SEQUENCE" => {
                    playlist.media_sequence = parse_num(value, line_no, tag)?;
                }
                "EXT-X-PLAYLIST-TYPE" => {
                    playlist.playlist_type = match value {
                        "VOD" => PlaylistType::Vod,
                        "EVENT" => PlaylistType::Event,
                        other => {
                            return Err(Error::invalid_playlist(
                                line_no,
                                format!("unknown playlist type {other:?}"),
                            ))
                        }
                    };
                }
                "EXT-X-KEY" => {
                    current_key = parse_key(value, base, line_no)?;
                }
                "EXTINF" => {
                    let (duration, title) = value.split_once(',').unwrap_or((value, ""));
                    let duration: f64 = duration.trim().parse().map_err(|_| {
                        Error::invalid_playlist(line_no, format!("bad EXTINF duration {duration:?}"))
                    })?;
                    if !duration.is_finite() || duration < 0.0 {
                        return Err(Error::invalid_playlist(line_no, "negative EXTINF duration"));
                    }
                    let title = (!title.is_empty()).then(|| title.to_string());
                    pending_duration = Some((duration, title));
                }
                "EXT-X-DISCONTINUITY" => pending_discontinuity = true,
                "EXT-X-ENDLIST" => playlist.ended = true,
                "EXT-X-STREAM-INF" => {
                    return Err(Error::unsupported("master playlists"));
                }
                // The registry keys fetches by URL alone; sub-ranges of one
                // resource and separately fetched init sections cannot be tracked.
                "EXT-X-BYTERANGE" => {
                    return Err(Error::unsupported("byte-range segments"));
                }
                "EXT-X-MAP" => {
                    return Err(Error::unsupported("EXT-X-MAP init sections"));
                }
                _ => {
                    tracing::trace!(line = line_no, tag, "Ignoring playlist tag");
                }
            }
            continue;
        }

        let Some((duration, title)) = pending_duration.take() else {
            return Err(Error::invalid_playlist(
                line_no,
                format!("segment URI {line:?} without #EXTINF"),
            ));
        };
        playlist.segments.push(SegmentEntry {
            duration,
            uri: resolve(base, line)?,
            title,
            discontinuity: std::mem::take(&mut pending_discontinuity),
            key: current_key.clone(),
        });
    }

    if playlist.ended && playlist.playlist_type == PlaylistType::Live {
        playlist.playlist_type = PlaylistType::Vod;
    }

    Ok(playlist)
}

fn parse_num<T: std::str::FromStr>(value: &str, line: usize, tag: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_playlist(line, format!("bad {tag} value {value:?}")))
}

fn parse_key(value: &str, base: Option<&Url>, line: usize) -> Result<Option<KeyTag>> {
    let method: EncryptionMethod = attribute(value, "METHOD")
        .ok_or_else(|| Error::invalid_playlist(line, "EXT-X-KEY without METHOD"))?
        .parse()
        .unwrap_or_default();
    if method == EncryptionMethod::None {
        return Ok(None);
    }
    let uri = attribute(value, "URI")
        .map(|u| resolve(base, &u))
        .transpose()?;
    let iv = match attribute(value, "IV") {
        Some(iv) => Some(
            parse_iv(&iv).ok_or_else(|| Error::invalid_playlist(line, format!("bad IV {iv:?}")))?,
        ),
        None => None,
    };
    Ok(Some(KeyTag { method, uri, iv }))
}

/// Extract `NAME=value` or `NAME="value"` from an attribute list.
fn attribute(list: &str, name: &str) -> Option<String> {
    let mut rest = list;
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=')?;
        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"')?;
            let remainder = quoted[end + 1..].trim_start_matches(',');
            (&quoted[..end], remainder)
        } else {
            match after.split_once(',') {
                Some((v, r)) => (v, r),
                None => (after, ""),
            }
        };
        if key.trim() == name {
            return Some(value.to_string());
        }
        rest = remainder;
    }
    None
}

fn resolve(base: Option<&Url>, uri: &str) -> Result<String> {
    match base {
        Some(base) => base
            .join(uri)
            .map(String::from)
            .map_err(|e| Error::InvalidUrl(format!("{uri}: {e}"))),
        None => Ok(uri.to_string()),
    }
}
