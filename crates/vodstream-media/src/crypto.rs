//! Segment decryption.
//!
//! HLS `METHOD=AES-128` segments are whole-file AES-128-CBC with PKCS#7
//! padding. When the manifest declares no IV, the media sequence number is
//! used as a 128-bit big-endian IV.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const AES_BLOCK_SIZE: usize = 16;

/// `#EXT-X-KEY` `METHOD` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EncryptionMethod {
    #[default]
    None,
    Aes128,
    SampleAes,
    Other(String),
}

impl FromStr for EncryptionMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "NONE" => Self::None,
            "AES-128" => Self::Aes128,
            "SAMPLE-AES" => Self::SampleAes,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Aes128 => f.write_str("AES-128"),
            Self::SampleAes => f.write_str("SAMPLE-AES"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Whole-segment decryption primitive.
pub trait Cipher: Send {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// AES-128-CBC with PKCS#7 padding.
#[derive(Clone)]
pub struct Aes128Cbc {
    key: [u8; AES_BLOCK_SIZE],
    iv: [u8; AES_BLOCK_SIZE],
}

impl Aes128Cbc {
    /// Build a cipher for `method`. Only `AES-128` is supported.
    pub fn new(method: &EncryptionMethod, key: &[u8], iv: [u8; AES_BLOCK_SIZE]) -> Result<Self> {
        if *method != EncryptionMethod::Aes128 {
            return Err(Error::unsupported(format!("encryption method {method}")));
        }
        let key: [u8; AES_BLOCK_SIZE] = key
            .try_into()
            .map_err(|_| Error::crypto(format!("key must be 16 bytes, got {}", key.len())))?;
        Ok(Self { key, iv })
    }

    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for Aes128Cbc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aes128Cbc").field("iv", &self.iv).finish_non_exhaustive()
    }
}

impl Cipher for Aes128Cbc {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::crypto(format!(
                "ciphertext length {} is not a multiple of {AES_BLOCK_SIZE}",
                data.len()
            )));
        }

        let mut buf = data.to_vec();
        let decryptor = cbc::Decryptor::<Aes128>::new((&self.key).into(), (&self.iv).into());
        let len = decryptor
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|e| Error::crypto(format!("PKCS7 unpad failed: {e}")))?
            .len();
        buf.truncate(len);
        tracing::trace!(encrypted = data.len(), decrypted = len, "aes128_cbc: segment decrypted");
        Ok(buf)
    }
}

/// IV derived from a media sequence number.
pub fn iv_from_sequence(sequence: u64) -> [u8; AES_BLOCK_SIZE] {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    iv[8..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// Parse a `0x`-prefixed hex IV attribute.
pub fn parse_iv(value: &str) -> Option<[u8; AES_BLOCK_SIZE]> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    if hex.len() != AES_BLOCK_SIZE * 2 {
        return None;
    }
    let mut iv = [0u8; AES_BLOCK_SIZE];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(iv)
}
