//! kinvault-store: the storage collaborator
//!
//! Rows hold identifiers, clear metadata, and opaque base64 blobs. The store
//! is the sole serialization point for membership uniqueness: a membership
//! row and its wrapped family key are always written together.

pub mod local;
pub mod rows;
pub mod store;

pub use local::LocalStore;
pub use rows::{
    Credentials, FamilyRow, MembershipRow, NewRecord, NewUser, RecordBody, RecordPatch,
    RecordQuery, RecordRow, UserRow,
};
pub use store::VaultStore;
