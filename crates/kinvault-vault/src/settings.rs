use kinvault_core::config::CryptoConfig;
use kinvault_core::KinvaultError;
use kinvault_crypto::{KdfParams, MIN_RSA_BITS};

/// Parameters applied to new registrations and password changes. Existing
/// users keep the KDF parameters recorded on their row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoSettings {
    pub kdf: KdfParams,
    pub rsa_bits: usize,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            rsa_bits: MIN_RSA_BITS,
        }
    }
}

impl TryFrom<&CryptoConfig> for CryptoSettings {
    type Error = KinvaultError;

    fn try_from(config: &CryptoConfig) -> Result<Self, Self::Error> {
        let kdf = match config.kdf.as_str() {
            "argon2id" => KdfParams::Argon2id {
                mem_cost_kib: config.argon2_mem_cost_kib,
                time_cost: config.argon2_time_cost,
                parallelism: config.argon2_parallelism,
            },
            "pbkdf2-sha256" => KdfParams::Pbkdf2Sha256 {
                iterations: config.pbkdf2_iterations,
            },
            other => {
                return Err(KinvaultError::Config(format!(
                    "unknown kdf '{other}' (expected argon2id or pbkdf2-sha256)"
                )))
            }
        };
        kdf.validate()
            .map_err(|e| KinvaultError::Config(e.to_string()))?;

        if config.rsa_bits < MIN_RSA_BITS {
            return Err(KinvaultError::Config(format!(
                "rsa_bits {} is below the {MIN_RSA_BITS}-bit minimum",
                config.rsa_bits
            )));
        }

        Ok(Self {
            kdf,
            rsa_bits: config.rsa_bits,
        })
    }
}
