//! AES-256-GCM content envelopes
//!
//! Envelope format (binary, base64 at rest):
//! ```text
//! [12 bytes: random nonce][16 bytes: GCM tag][N bytes: ciphertext]
//! ```
//!
//! Note the tag precedes the ciphertext, unlike the `ciphertext || tag`
//! output of the combined AEAD API. Every client must agree on this order.
//! A fresh nonce is drawn from the caller's CSPRNG on every call, so sealing
//! the same plaintext twice never yields the same envelope.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// A sealed `nonce ‖ tag ‖ ciphertext` byte string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Vec<u8>,
}

impl Envelope {
    /// Wrap raw envelope bytes, rejecting anything too short to hold a nonce
    /// and a tag.
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        Ok(Self { bytes })
    }

    pub fn from_b64(s: &str) -> CryptoResult<Self> {
        Self::from_bytes(encoding::decode(s)?)
    }

    pub fn to_b64(&self) -> String {
        encoding::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn nonce(&self) -> &[u8] {
        &self.bytes[..NONCE_SIZE]
    }

    pub fn tag(&self) -> &[u8] {
        &self.bytes[NONCE_SIZE..NONCE_SIZE + TAG_SIZE]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[NONCE_SIZE + TAG_SIZE..]
    }
}

/// Encrypt `plaintext` under a 256-bit key.
pub fn seal<R: RngCore + CryptoRng>(
    key: &[u8; KEY_SIZE],
    plaintext: &[u8],
    rng: &mut R,
) -> CryptoResult<Envelope> {
    let cipher = Aes256Gcm::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce_bytes), b"", &mut buffer)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut bytes = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + buffer.len());
    bytes.extend_from_slice(&nonce_bytes);
    bytes.extend_from_slice(&tag);
    bytes.extend_from_slice(&buffer);
    Ok(Envelope { bytes })
}

/// Decrypt an envelope. The tag is verified before any plaintext is returned.
pub fn open(key: &[u8; KEY_SIZE], envelope: &Envelope) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.into());

    let mut buffer = envelope.ciphertext().to_vec();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(envelope.nonce()),
        b"",
        &mut buffer,
        Tag::from_slice(envelope.tag()),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            // the buffer holds keystream-applied bytes on failure; discard them
            buffer.zeroize();
            Err(CryptoError::DecryptionFailed)
        }
    }
}

/// [`seal`] and base64-encode in one step.
pub fn seal_b64<R: RngCore + CryptoRng>(
    key: &[u8; KEY_SIZE],
    plaintext: &[u8],
    rng: &mut R,
) -> CryptoResult<String> {
    Ok(seal(key, plaintext, rng)?.to_b64())
}

/// Decode a base64 envelope and [`open`] it.
pub fn open_b64(key: &[u8; KEY_SIZE], encoded: &str) -> CryptoResult<Vec<u8>> {
    open(key, &Envelope::from_b64(encoded)?)
}
