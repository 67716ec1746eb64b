//! The one binary-to-text encoding used at the storage boundary: standard
//! base64 with padding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CryptoError, CryptoResult};

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a stored artifact. Undecodable input is reported like any other
/// decryption failure.
pub fn decode(s: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(s.trim())
        .map_err(|_| CryptoError::DecryptionFailed)
}
