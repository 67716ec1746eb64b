//! kinvault-crypto: client-side key hierarchy for shared family records
//!
//! The server only ever stores what this crate emits as base64 text. Every
//! plaintext and every unwrapped key exists only on a member's device.
//!
//! Key hierarchy:
//! ```text
//! Password ──KDF(salt)──► Key-Encryption Key (256-bit, never persisted)
//!   └── seals ► Identity private key (RSA, PKCS#8 PEM) in an AES-256-GCM envelope
//!
//! Identity public key (SPKI PEM, stored in the clear)
//!   └── RSA-OAEP(SHA-256) wraps ► Family Key (256-bit random, one per family)
//!         └── AES-256-GCM envelope per record field (nonce ‖ tag ‖ ciphertext)
//! ```

pub mod cipher;
pub mod encoding;
pub mod error;
pub mod family;
pub mod identity;
pub mod kdf;
pub mod verifier;

pub use cipher::{open, open_b64, seal, seal_b64, Envelope};
pub use error::{CryptoError, CryptoResult};
pub use family::{mint_family_key, unwrap_family_key, wrap_for_member, FamilyKey, WrappedFamilyKey};
pub use identity::{IdentityBundle, IdentityKeypair, PublicIdentity, MIN_RSA_BITS};
pub use kdf::{derive_kek, KdfParams, KeyEncryptionKey, Salt, MIN_PBKDF2_ITERATIONS};
pub use verifier::{hash_password, verify_password};

/// Size of every symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a per-user KDF salt
pub const SALT_SIZE: usize = 16;
