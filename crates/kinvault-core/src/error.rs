use thiserror::Error;

use crate::types::{FamilyId, RecordId, UserId};

pub type KinvaultResult<T> = Result<T, KinvaultError>;

/// State conflicts and storage failures.
///
/// None of these are security sensitive, so they carry full detail. Failures
/// of decryption live in `kinvault_crypto::CryptoError` and stay opaque.
#[derive(Debug, Error)]
pub enum KinvaultError {
    #[error("phone number already registered: {0}")]
    UserExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("incorrect phone or password")]
    InvalidCredentials,

    #[error("family not found: {0}")]
    FamilyNotFound(FamilyId),

    #[error("user {user} is not a member of family {family}")]
    NotAMember { family: FamilyId, user: UserId },

    #[error("only the owner of family {family} can do this (user {user} is not)")]
    NotOwner { family: FamilyId, user: UserId },

    #[error("user {user} is already a member of family {family}")]
    AlreadyMember { family: FamilyId, user: UserId },

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
