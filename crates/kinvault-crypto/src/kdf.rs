//! Password KDF: password + per-user salt → 256-bit key-encryption key
//!
//! The derived key is never stored. It is recomputed on every login and is the
//! only way to open the sealed identity private key, so derivation must be
//! byte-for-byte deterministic for a given (password, salt, params).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// Lowest PBKDF2 work factor accepted for new or existing envelopes
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// A 256-bit key derived from a password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct KeyEncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl KeyEncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for KeyEncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// KDF scheme and work factor, recorded per user next to the salt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum KdfParams {
    /// Memory-hard default
    Argon2id {
        /// Memory cost in KiB
        mem_cost_kib: u32,
        /// Time cost / iterations
        time_cost: u32,
        parallelism: u32,
    },
    /// Baseline scheme, compatible with PBKDF2-based clients
    Pbkdf2Sha256 { iterations: u32 },
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams::Argon2id {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// PBKDF2-HMAC-SHA256 at the minimum accepted iteration count.
    pub fn pbkdf2_baseline() -> Self {
        KdfParams::Pbkdf2Sha256 {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }

    pub fn validate(&self) -> CryptoResult<()> {
        match *self {
            KdfParams::Argon2id {
                mem_cost_kib,
                time_cost,
                parallelism,
            } => Params::new(mem_cost_kib, time_cost, parallelism, Some(KEY_SIZE))
                .map(|_| ())
                .map_err(|e| CryptoError::InvalidParams(format!("Argon2id: {e}"))),
            KdfParams::Pbkdf2Sha256 { iterations } if iterations < MIN_PBKDF2_ITERATIONS => {
                Err(CryptoError::InvalidParams(format!(
                    "PBKDF2 iterations {iterations} below minimum {MIN_PBKDF2_ITERATIONS}"
                )))
            }
            KdfParams::Pbkdf2Sha256 { .. } => Ok(()),
        }
    }
}

/// Random per-user KDF salt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rng.fill_bytes(&mut bytes);
        Salt(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Salt(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        encoding::encode(&self.0)
    }

    /// Parse a stored salt. A salt of the wrong length can never open the
    /// envelope it sits next to, so it fails the same way a bad tag does.
    pub fn from_b64(s: &str) -> CryptoResult<Self> {
        let bytes = encoding::decode(s)?;
        let bytes: [u8; SALT_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(Salt(bytes))
    }
}

/// Derive a 256-bit key-encryption key from a password and salt.
///
/// Cannot itself detect a wrong password: a wrong password yields a
/// different key, which the envelope's authentication check then rejects.
pub fn derive_kek(
    password: &SecretString,
    salt: &Salt,
    params: &KdfParams,
) -> CryptoResult<KeyEncryptionKey> {
    params.validate()?;
    let mut key = [0u8; KEY_SIZE];

    match *params {
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        } => {
            let argon2_params = Params::new(mem_cost_kib, time_cost, parallelism, Some(KEY_SIZE))
                .map_err(|e| CryptoError::InvalidParams(format!("Argon2id: {e}")))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(
                    password.expose_secret().as_bytes(),
                    salt.as_bytes(),
                    &mut key,
                )
                .map_err(|e| CryptoError::InvalidParams(format!("Argon2id KDF failed: {e}")))?;
        }
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(
                password.expose_secret().as_bytes(),
                salt.as_bytes(),
                iterations,
                &mut key,
            );
        }
    }

    Ok(KeyEncryptionKey::from_bytes(key))
}
