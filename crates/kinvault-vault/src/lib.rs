//! kinvault-vault: the client side of the family vault
//!
//! Composes the key hierarchy from `kinvault-crypto` with the storage
//! boundary from `kinvault-store`:
//!
//! - [`account`]: registration, login (verifier check, then identity unseal),
//!   password change
//! - [`family`]: family creation, member grants, family key unwrap
//! - [`records`]: per-field sealing of milestones, notes, and to-dos
//! - [`access`]: the member / owner capability check
//!
//! Every operation that needs randomness takes the caller's CSPRNG
//! explicitly. Nothing here holds process-wide cryptographic state.

pub mod access;
pub mod account;
pub mod error;
pub mod family;
pub mod records;
pub mod settings;

use kinvault_core::{FamilyId, UserId};
use kinvault_crypto::IdentityKeypair;
use kinvault_store::{UserRow, VaultStore};

pub use access::Capability;
pub use error::{VaultError, VaultResult};
pub use family::{FamilyMember, MyFamily};
pub use records::{
    Milestone, MilestoneDraft, Note, NoteDraft, NoteUpdate, Todo, TodoDraft, TodoUpdate,
};
pub use settings::CryptoSettings;

/// Client-side handle over a store
pub struct Vault<S> {
    store: S,
    settings: CryptoSettings,
}

impl<S: VaultStore> Vault<S> {
    pub fn new(store: S, settings: CryptoSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &CryptoSettings {
        &self.settings
    }

    fn capability(&self, session: &Session, family: FamilyId) -> VaultResult<Capability> {
        Ok(Capability::evaluate(&self.store, family, session.user_id())?)
    }
}

/// A logged-in user with their identity unlocked in memory
#[derive(Debug)]
pub struct Session {
    user: UserRow,
    identity: IdentityKeypair,
}

impl Session {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn user(&self) -> &UserRow {
        &self.user
    }

    pub fn identity(&self) -> &IdentityKeypair {
        &self.identity
    }
}
