use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Tag mismatch, OAEP padding failure, truncated envelope, bad base64, or
    /// a wrong password. All of these collapse into this one variant so a
    /// caller cannot tell which check failed.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid KDF parameters: {0}")]
    InvalidParams(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
