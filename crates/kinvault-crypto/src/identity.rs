//! Per-user RSA identity keypair and its password-sealed storage form
//!
//! Stored per user:
//! - `public_key`: SubjectPublicKeyInfo PEM, in the clear
//! - `encrypted_private_key`: base64 AES-256-GCM envelope of the PKCS#8 PEM,
//!   sealed under the password-derived key
//! - `private_key_salt`: base64 KDF salt
//! - `kdf`: scheme and work factor used with that salt

use rand::{CryptoRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher::{self, Envelope};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_kek, KdfParams, Salt};

/// Smallest RSA modulus accepted for generation or for wrapping to
pub const MIN_RSA_BITS: usize = 2048;

/// The clear-text half of a user's identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    key: RsaPublicKey,
}

impl PublicIdentity {
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem.trim())
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        if key.size() * 8 < MIN_RSA_BITS {
            return Err(CryptoError::InvalidPublicKey(format!(
                "{}-bit modulus is below the {MIN_RSA_BITS}-bit minimum",
                key.size() * 8
            )));
        }
        Ok(Self { key })
    }

    pub fn to_pem(&self) -> CryptoResult<String> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Short BLAKE3 fingerprint of the DER encoding, for out-of-band comparison
    pub fn fingerprint(&self) -> CryptoResult<String> {
        let der = self
            .key
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(blake3::hash(der.as_bytes()).to_hex().as_str()[..16].to_string())
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }
}

/// A user's unlocked identity. Only ever held client-side after login.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityKeypair {
    private: RsaPrivateKey,
    public: PublicIdentity,
}

impl std::fmt::Debug for IdentityKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeypair")
            .field("private", &"[REDACTED]")
            .field("bits", &self.public.bits())
            .finish()
    }
}

/// What the server stores for a user's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBundle {
    pub public_key: String,
    pub encrypted_private_key: String,
    pub private_key_salt: String,
    pub kdf: KdfParams,
}

impl IdentityKeypair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, bits: usize) -> CryptoResult<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyGeneration(format!(
                "{bits}-bit RSA is below the {MIN_RSA_BITS}-bit minimum"
            )));
        }
        let private = RsaPrivateKey::new(rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = PublicIdentity {
            key: RsaPublicKey::from(&private),
        };
        tracing::debug!(bits, "generated identity keypair");
        Ok(Self { private, public })
    }

    pub fn public(&self) -> &PublicIdentity {
        &self.public
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Seal the private key under a key derived from `password` with a fresh
    /// random salt.
    pub fn seal<R: RngCore + CryptoRng>(
        &self,
        password: &SecretString,
        params: &KdfParams,
        rng: &mut R,
    ) -> CryptoResult<IdentityBundle> {
        let salt = Salt::generate(rng);
        let kek = derive_kek(password, &salt, params)?;

        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let envelope = cipher::seal(kek.as_bytes(), pem.as_bytes(), rng)?;

        Ok(IdentityBundle {
            public_key: self.public.to_pem()?,
            encrypted_private_key: envelope.to_b64(),
            private_key_salt: salt.to_b64(),
            kdf: *params,
        })
    }

    /// Recover the identity from its stored bundle.
    ///
    /// A wrong password, a damaged envelope, and a private key that does not
    /// match the stored public key all fail with [`CryptoError::DecryptionFailed`].
    pub fn unseal(bundle: &IdentityBundle, password: &SecretString) -> CryptoResult<Self> {
        let salt = Salt::from_b64(&bundle.private_key_salt)?;
        // The recorded parameters are envelope input like any other field
        let kek = derive_kek(password, &salt, &bundle.kdf)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let envelope = Envelope::from_b64(&bundle.encrypted_private_key)?;
        let pem = Zeroizing::new(cipher::open(kek.as_bytes(), &envelope)?);
        let pem = std::str::from_utf8(&pem).map_err(|_| CryptoError::DecryptionFailed)?;
        let private =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|_| CryptoError::DecryptionFailed)?;

        let public = PublicIdentity {
            key: RsaPublicKey::from(&private),
        };
        let stored = PublicIdentity::from_pem(&bundle.public_key)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        if stored != public {
            return Err(CryptoError::DecryptionFailed);
        }

        Ok(Self { private, public })
    }

    /// Re-seal an existing bundle under a new password. The keypair itself is
    /// unchanged, so every wrapped family key stays valid.
    pub fn reseal<R: RngCore + CryptoRng>(
        bundle: &IdentityBundle,
        old_password: &SecretString,
        new_password: &SecretString,
        params: &KdfParams,
        rng: &mut R,
    ) -> CryptoResult<IdentityBundle> {
        let identity = Self::unseal(bundle, old_password)?;
        identity.seal(new_password, params, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn fast_params() -> KdfParams {
        KdfParams::Argon2id {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn shared_keypair() -> &'static IdentityKeypair {
        static KEYPAIR: OnceLock<IdentityKeypair> = OnceLock::new();
        KEYPAIR.get_or_init(|| IdentityKeypair::generate(&mut rand::thread_rng(), 2048).unwrap())
    }

    #[test]
    fn test_generate_rejects_small_modulus() {
        let result = IdentityKeypair::generate(&mut rand::thread_rng(), 1024);
        assert!(matches!(result, Err(CryptoError::KeyGeneration(_))));
    }

    #[test]
    fn test_public_pem_roundtrip() {
        let keypair = shared_keypair();
        let pem = keypair.public().to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));

        let parsed = PublicIdentity::from_pem(&pem).unwrap();
        assert_eq!(&parsed, keypair.public());
        assert_eq!(parsed.bits(), 2048);
    }

    #[test]
    fn test_invalid_public_pem() {
        assert!(matches!(
            PublicIdentity::from_pem("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----"),
            Err(CryptoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let mut rng = rand::thread_rng();
        let keypair = shared_keypair();
        let bundle = keypair
            .seal(&SecretString::from("pw1"), &fast_params(), &mut rng)
            .unwrap();

        let recovered = IdentityKeypair::unseal(&bundle, &SecretString::from("pw1")).unwrap();
        assert_eq!(&recovered, keypair);
    }

    #[test]
    fn test_unseal_wrong_password_fails() {
        let mut rng = rand::thread_rng();
        let bundle = shared_keypair()
            .seal(&SecretString::from("pw1"), &fast_params(), &mut rng)
            .unwrap();

        let result = IdentityKeypair::unseal(&bundle, &SecretString::from("pw2"));
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_seal_uses_fresh_salt_and_nonce() {
        let mut rng = rand::thread_rng();
        let password = SecretString::from("pw1");
        let a = shared_keypair().seal(&password, &fast_params(), &mut rng).unwrap();
        let b = shared_keypair().seal(&password, &fast_params(), &mut rng).unwrap();

        assert_ne!(a.private_key_salt, b.private_key_salt);
        assert_ne!(a.encrypted_private_key, b.encrypted_private_key);
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn test_pbkdf2_bundle_roundtrip() {
        let mut rng = rand::thread_rng();
        let password = SecretString::from("my_secure_password_123");
        let bundle = shared_keypair()
            .seal(&password, &KdfParams::pbkdf2_baseline(), &mut rng)
            .unwrap();
        assert_eq!(bundle.kdf, KdfParams::pbkdf2_baseline());

        let recovered = IdentityKeypair::unseal(&bundle, &password).unwrap();
        assert_eq!(&recovered, shared_keypair());
    }

    #[test]
    fn test_tampered_private_key_envelope_fails() {
        let mut rng = rand::thread_rng();
        let password = SecretString::from("pw1");
        let mut bundle = shared_keypair().seal(&password, &fast_params(), &mut rng).unwrap();

        let mut raw = crate::encoding::decode(&bundle.encrypted_private_key).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x80;
        bundle.encrypted_private_key = crate::encoding::encode(&raw);

        assert!(matches!(
            IdentityKeypair::unseal(&bundle, &password),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_kdf_params_fail_opaquely() {
        let mut rng = rand::thread_rng();
        let password = SecretString::from("pw1");
        let mut bundle = shared_keypair().seal(&password, &fast_params(), &mut rng).unwrap();

        bundle.kdf = KdfParams::Pbkdf2Sha256 { iterations: 1000 };
        assert!(matches!(
            IdentityKeypair::unseal(&bundle, &password),
            Err(CryptoError::DecryptionFailed)
        ));

        bundle.kdf = KdfParams::Argon2id {
            mem_cost_kib: 0,
            time_cost: 0,
            parallelism: 0,
        };
        assert!(matches!(
            IdentityKeypair::unseal(&bundle, &password),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_mismatched_public_key_fails() {
        let mut rng = rand::thread_rng();
        let password = SecretString::from("pw1");
        let mut bundle = shared_keypair().seal(&password, &fast_params(), &mut rng).unwrap();

        let other = IdentityKeypair::generate(&mut rng, 2048).unwrap();
        bundle.public_key = other.public().to_pem().unwrap();

        assert!(matches!(
            IdentityKeypair::unseal(&bundle, &password),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_reseal_changes_password_keeps_keypair() {
        let mut rng = rand::thread_rng();
        let old = SecretString::from("old-pw");
        let new = SecretString::from("new-pw");
        let bundle = shared_keypair().seal(&old, &fast_params(), &mut rng).unwrap();

        let resealed =
            IdentityKeypair::reseal(&bundle, &old, &new, &fast_params(), &mut rng).unwrap();

        assert_eq!(resealed.public_key, bundle.public_key);
        assert_ne!(resealed.private_key_salt, bundle.private_key_salt);
        assert!(IdentityKeypair::unseal(&resealed, &old).is_err());
        assert_eq!(
            &IdentityKeypair::unseal(&resealed, &new).unwrap(),
            shared_keypair()
        );
    }

    #[test]
    fn test_reseal_wrong_old_password_fails() {
        let mut rng = rand::thread_rng();
        let bundle = shared_keypair()
            .seal(&SecretString::from("pw1"), &fast_params(), &mut rng)
            .unwrap();
        let result = IdentityKeypair::reseal(
            &bundle,
            &SecretString::from("nope"),
            &SecretString::from("new"),
            &fast_params(),
            &mut rng,
        );
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_fingerprint_stable() {
        let fp1 = shared_keypair().public().fingerprint().unwrap();
        let pem = shared_keypair().public().to_pem().unwrap();
        let fp2 = PublicIdentity::from_pem(&pem).unwrap().fingerprint().unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 16);
        assert!(fp1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let dbg = format!("{:?}", shared_keypair());
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("BEGIN"));
    }
}
