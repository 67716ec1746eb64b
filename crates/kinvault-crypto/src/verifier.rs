//! Login password verifier, stored as an Argon2id PHC string.
//!
//! Uses its own random salt, independent of the identity KDF salt, so the
//! stored hash is never the key-encryption key.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::{CryptoRng, RngCore};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::SALT_SIZE;

pub fn hash_password<R: RngCore + CryptoRng>(
    password: &SecretString,
    rng: &mut R,
) -> CryptoResult<String> {
    let mut salt_bytes = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &SecretString, stored: &str) -> bool {
    let Ok(hash) = PasswordHash::new(stored) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &hash)
        .is_ok()
}
