//! Decryptor component: decrypt-input channel to segment channel.

use bytes::Bytes;

use vodstream_media::crypto::iv_from_sequence;
use vodstream_media::{Aes128Cbc, ChannelHandle, Cipher, EncryptionMethod, Result, Segment};

use crate::events::{DecryptSignal, Emitter};

/// Key material for one encrypted stream.
#[derive(Debug, Clone)]
pub struct DecryptConfig {
    pub key: Bytes,
    /// Explicit IV; `None` derives it from each segment's sequence number.
    pub iv: Option<[u8; 16]>,
    pub method: EncryptionMethod,
}

pub struct Decryptor {
    config: DecryptConfig,
    input: ChannelHandle,
    output: ChannelHandle,
    emitter: Emitter,
}

impl Decryptor {
    /// Fails if the method is unsupported or the key is malformed.
    pub fn new(
        config: DecryptConfig,
        input: ChannelHandle,
        output: ChannelHandle,
        emitter: Emitter,
    ) -> Result<Self> {
        Aes128Cbc::new(&config.method, &config.key, [0u8; 16])?;
        Ok(Self {
            config,
            input,
            output,
            emitter,
        })
    }

    /// Decrypt everything buffered for `segment` into the output channel and
    /// emit `Decrypted`.
    pub fn decrypt(&mut self, segment: &Segment) -> Result<()> {
        let ciphertext = self.input.lock().shift();
        let iv = self
            .config
            .iv
            .unwrap_or_else(|| iv_from_sequence(segment.sequence));
        let cipher = Aes128Cbc::new(&self.config.method, &self.config.key, iv)?;
        let plaintext = cipher.decrypt(&ciphertext)?;

        tracing::debug!(
            url = %segment.url,
            encrypted = ciphertext.len(),
            decrypted = plaintext.len(),
            "Segment decrypted"
        );
        self.output.lock().append(Bytes::from(plaintext));
        self.emitter.emit(DecryptSignal::Decrypted {
            url: segment.url.clone(),
        });
        Ok(())
    }
}
