//! HLS playlist structures.

use std::fmt;

use crate::crypto::EncryptionMethod;
use crate::playlist::{EncryptInfo, ParsedManifest, SegmentDescriptor};

/// Media playlist for a single rendition.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// Target duration in seconds.
    pub target_duration: u32,
    /// Media sequence number of the first segment.
    pub media_sequence: u64,
    /// Playlist type (VOD or EVENT).
    pub playlist_type: PlaylistType,
    /// Segment entries.
    pub segments: Vec<SegmentEntry>,
    /// Whether this is an ended playlist.
    pub ended: bool,
}

impl MediaPlaylist {
    /// Create an empty VOD playlist.
    pub fn vod() -> Self {
        Self {
            target_duration: 6,
            media_sequence: 0,
            playlist_type: PlaylistType::Vod,
            segments: Vec::new(),
            ended: true,
        }
    }

    /// Total duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Convert to registry input.
    ///
    /// Start times accumulate in seconds and are rounded once per segment so
    /// long playlists do not drift. The first keyed segment sets the
    /// stream-level encryption record; without an explicit IV, decryption
    /// falls back to each segment's sequence number.
    pub fn to_manifest(&self) -> ParsedManifest {
        let mut segments = Vec::with_capacity(self.segments.len());
        let mut elapsed = 0.0f64;

        for (i, entry) in self.segments.iter().enumerate() {
            let start_ms = secs_to_ms(elapsed);
            elapsed += entry.duration;
            segments.push(SegmentDescriptor {
                url: entry.uri.clone(),
                start_ms,
                duration_ms: secs_to_ms(elapsed) - start_ms,
                sequence: self.media_sequence + i as u64,
            });
        }

        let encrypt = self
            .segments
            .iter()
            .find_map(|s| s.key.as_ref())
            .filter(|k| k.method != EncryptionMethod::None)
            .map(|key| EncryptInfo {
                uri: key.uri.clone(),
                method: key.method.clone(),
                key: None,
                iv: key.iv,
            });

        ParsedManifest {
            segments,
            target_duration_ms: u64::from(self.target_duration) * 1000,
            duration_ms: secs_to_ms(elapsed),
            encrypt,
            ended: self.ended,
        }
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}

impl fmt::Display for MediaPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#EXTM3U")?;
        writeln!(f, "#EXT-X-VERSION:3")?;
        writeln!(f, "#EXT-X-TARGETDURATION:{}", self.target_duration)?;
        writeln!(f, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence)?;

        match self.playlist_type {
            PlaylistType::Vod => writeln!(f, "#EXT-X-PLAYLIST-TYPE:VOD")?,
            PlaylistType::Event => writeln!(f, "#EXT-X-PLAYLIST-TYPE:EVENT")?,
            PlaylistType::Live => {}
        }

        let mut current_key: Option<&KeyTag> = None;
        for segment in &self.segments {
            if segment.key.as_ref() != current_key {
                if let Some(ref key) = segment.key {
                    writeln!(f, "{}", key)?;
                }
                current_key = segment.key.as_ref();
            }
            if segment.discontinuity {
                writeln!(f, "#EXT-X-DISCONTINUITY")?;
            }
            match segment.title {
                Some(ref title) => writeln!(f, "#EXTINF:{:.6},{}", segment.duration, title)?,
                None => writeln!(f, "#EXTINF:{:.6},", segment.duration)?,
            }
            writeln!(f, "{}", segment.uri)?;
        }

        if self.ended {
            writeln!(f, "#EXT-X-ENDLIST")?;
        }
        Ok(())
    }
}

/// Playlist type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistType {
    Vod,
    Event,
    Live,
}

/// `#EXT-X-KEY` in effect for a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTag {
    pub method: EncryptionMethod,
    pub uri: Option<String>,
    pub iv: Option<[u8; 16]>,
}

impl fmt::Display for KeyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#EXT-X-KEY:METHOD={}", self.method)?;
        if let Some(ref uri) = self.uri {
            write!(f, ",URI=\"{}\"", uri)?;
        }
        if let Some(iv) = self.iv {
            write!(f, ",IV=0x")?;
            for b in iv {
                write!(f, "{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// A segment entry in the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    /// Duration in seconds.
    pub duration: f64,
    /// Segment URI.
    pub uri: String,
    /// Optional title.
    pub title: Option<String>,
    /// Discontinuity before this segment.
    pub discontinuity: bool,
    /// Key in effect.
    pub key: Option<KeyTag>,
}

impl SegmentEntry {
    pub fn new(uri: impl Into<String>, duration: f64) -> Self {
        Self {
            duration,
            uri: uri.into(),
            title: None,
            discontinuity: false,
            key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_playlist_render() {
        let mut playlist = MediaPlaylist::vod();
        playlist.target_duration = 6;
        playlist.segments.push(SegmentEntry::new("/seg0.ts", 5.5));
        playlist.segments.push(SegmentEntry::new("/seg1.ts", 6.0));

        let m3u8 = playlist.to_string();

        assert!(m3u8.starts_with("#EXTM3U\n"));
        assert!(m3u8.contains("#EXT-X-TARGETDURATION:6"));
        assert!(m3u8.contains("#EXT-X-PLAYLIST-TYPE:VOD"));
        assert!(!m3u8.contains("#EXT-X-MAP"));
        assert!(m3u8.contains("#EXTINF:5.500000,"));
        assert!(m3u8.contains("/seg0.ts"));
        assert!(m3u8.ends_with("#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn test_render_key_once_per_change() {
        let key = KeyTag {
            method: EncryptionMethod::Aes128,
            uri: Some("/key".into()),
            iv: None,
        };
        let mut playlist = MediaPlaylist::vod();
        for i in 0..3 {
            let mut seg = SegmentEntry::new(format!("/seg{i}.ts"), 4.0);
            seg.key = Some(key.clone());
            playlist.segments.push(seg);
        }

        let m3u8 = playlist.to_string();
        assert_eq!(m3u8.matches("#EXT-X-KEY:METHOD=AES-128,URI=\"/key\"").count(), 1);
    }

    #[test]
    fn test_to_manifest_start_times() {
        let mut playlist = MediaPlaylist::vod();
        playlist.target_duration = 5;
        playlist.media_sequence = 10;
        playlist.segments.push(SegmentEntry::new("a.ts", 4.004));
        playlist.segments.push(SegmentEntry::new("b.ts", 4.004));
        playlist.segments.push(SegmentEntry::new("c.ts", 2.0));

        let manifest = playlist.to_manifest();
        let starts: Vec<u64> = manifest.segments.iter().map(|s| s.start_ms).collect();
        assert_eq!(starts, vec![0, 4004, 8008]);
        assert_eq!(manifest.segments[2].sequence, 12);
        assert_eq!(manifest.duration_ms, 10008);
        assert_eq!(manifest.target_duration_ms, 5000);
        assert!(manifest.encrypt.is_none());
        assert!(manifest.ended);
    }

    #[test]
    fn test_to_manifest_encrypt_record() {
        let mut playlist = MediaPlaylist::vod();
        playlist.media_sequence = 3;
        let mut seg = SegmentEntry::new("a.ts", 4.0);
        seg.key = Some(KeyTag {
            method: EncryptionMethod::Aes128,
            uri: Some("http://cdn/key".into()),
            iv: None,
        });
        playlist.segments.push(seg);

        let manifest = playlist.to_manifest();
        let encrypt = manifest.encrypt.unwrap();
        assert!(encrypt.needs_key());
        assert_eq!(encrypt.uri.as_deref(), Some("http://cdn/key"));
        assert!(encrypt.iv.is_none());
        assert_eq!(manifest.segments[0].sequence, 3);
    }
}
