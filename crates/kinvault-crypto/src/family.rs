//! Family keys: one random AES-256 key per family, distributed to each member
//! by encrypting it to their RSA public key (OAEP, SHA-256 digest and MGF1,
//! empty label).

use rand::{CryptoRng, RngCore};
use rsa::Oaep;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::cipher;
use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::identity::{IdentityKeypair, PublicIdentity};
use crate::KEY_SIZE;

/// Symmetric key shared by every member of one family.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FamilyKey {
    bytes: [u8; KEY_SIZE],
}

impl FamilyKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Seal one record field under this key, returning the base64 envelope.
    pub fn seal_field<R: RngCore + CryptoRng>(
        &self,
        plaintext: &str,
        rng: &mut R,
    ) -> CryptoResult<String> {
        cipher::seal_b64(&self.bytes, plaintext.as_bytes(), rng)
    }

    /// Open a field sealed with [`FamilyKey::seal_field`].
    pub fn open_field(&self, encoded: &str) -> CryptoResult<String> {
        let bytes = cipher::open_b64(&self.bytes, encoded)?;
        String::from_utf8(bytes).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CryptoError::DecryptionFailed
        })
    }
}

impl Drop for FamilyKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FamilyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Draw a fresh family key from the caller's CSPRNG.
pub fn mint_family_key<R: RngCore + CryptoRng>(rng: &mut R) -> FamilyKey {
    let mut bytes = [0u8; KEY_SIZE];
    rng.fill_bytes(&mut bytes);
    FamilyKey { bytes }
}

/// A family key encrypted to one member's public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedFamilyKey(Vec<u8>);

impl WrappedFamilyKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn from_b64(s: &str) -> CryptoResult<Self> {
        Ok(Self(encoding::decode(s)?))
    }
}

/// Encrypt `key` so that only the holder of `member`'s private key can
/// recover it. Randomized: wrapping twice gives different ciphertexts.
pub fn wrap_for_member<R: RngCore + CryptoRng>(
    key: &FamilyKey,
    member: &PublicIdentity,
    rng: &mut R,
) -> CryptoResult<WrappedFamilyKey> {
    let wrapped = member
        .rsa()
        .encrypt(rng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok(WrappedFamilyKey(wrapped))
}

/// Recover a family key with the member's own private key.
pub fn unwrap_family_key(
    wrapped: &WrappedFamilyKey,
    identity: &IdentityKeypair,
) -> CryptoResult<FamilyKey> {
    let plain = Zeroizing::new(
        identity
            .rsa()
            .decrypt(Oaep::new::<Sha256>(), &wrapped.0)
            .map_err(|_| CryptoError::DecryptionFailed)?,
    );
    let bytes: [u8; KEY_SIZE] = plain
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(FamilyKey { bytes })
}
