use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from kinvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KinvaultConfig {
    pub log: LogConfig,
    pub crypto: CryptoConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Client-side key hierarchy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Password KDF for new registrations: "argon2id" or "pbkdf2-sha256"
    pub kdf: String,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// PBKDF2-HMAC-SHA256 iteration count (default and minimum: 100000)
    pub pbkdf2_iterations: u32,
    /// RSA modulus size for identity keypairs (default and minimum: 2048)
    pub rsa_bits: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: "argon2id".into(),
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            pbkdf2_iterations: 100_000,
            rsa_bits: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON vault file holding users, families, memberships and records
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/kinvault/vault.json"),
        }
    }
}
