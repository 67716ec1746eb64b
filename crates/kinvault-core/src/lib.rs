pub mod config;
pub mod error;
pub mod types;

pub use error::{KinvaultError, KinvaultResult};
pub use types::{FamilyId, NoteCategory, RecordId, RecordKind, Role, TodoCategory, UserId};
