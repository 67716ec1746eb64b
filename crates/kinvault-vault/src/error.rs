use kinvault_core::KinvaultError;
use kinvault_crypto::CryptoError;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Opaque cryptographic failure; never says which check failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// State conflict or storage failure; safe to report in detail
    #[error(transparent)]
    State(#[from] KinvaultError),
}

impl VaultError {
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, VaultError::Crypto(CryptoError::DecryptionFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_decryption_failed_counts_as_decryption_failure() {
        assert!(VaultError::from(CryptoError::DecryptionFailed).is_decryption_failure());
        assert!(!VaultError::from(CryptoError::EncryptionFailed).is_decryption_failure());
        assert!(!VaultError::from(KinvaultError::InvalidCredentials).is_decryption_failure());
    }
}
