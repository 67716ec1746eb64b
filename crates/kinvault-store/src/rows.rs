//! Rows as the storage collaborator sees them: identifiers, clear metadata,
//! and opaque base64 blobs. Nothing here is ever plaintext record content.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use kinvault_core::{FamilyId, NoteCategory, RecordId, RecordKind, Role, TodoCategory, UserId};
use kinvault_crypto::KdfParams;
use serde::{Deserialize, Serialize};

/// Per-user credentials: login verifier plus the sealed identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Argon2 PHC string, independent of the KDF salt
    pub password_hash: String,
    /// SPKI PEM
    pub public_key: String,
    /// base64 `nonce ‖ tag ‖ ciphertext` of the PKCS#8 PEM
    pub encrypted_private_key: String,
    /// base64 KDF salt
    pub private_key_salt: String,
    pub kdf: KdfParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub phone: String,
    pub username: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub phone: String,
    pub username: String,
    pub credentials: Credentials,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRow {
    pub id: FamilyId,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One (family, user) grant. The wrapped key and the row are written together
/// or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub family_id: FamilyId,
    pub user_id: UserId,
    pub role: Role,
    /// base64 RSA-OAEP ciphertext of the family key for this member
    pub encrypted_family_key: String,
    pub joined_at: DateTime<Utc>,
}

/// Ciphertext fields and clear query fields of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    Milestone {
        event_date: NaiveDate,
        content_ciphertext: String,
    },
    Note {
        title_ciphertext: String,
        content_ciphertext: String,
        category: NoteCategory,
    },
    Todo {
        title_ciphertext: String,
        description_ciphertext: Option<String>,
        category: TodoCategory,
        is_completed: bool,
    },
}

impl RecordBody {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordBody::Milestone { .. } => RecordKind::Milestone,
            RecordBody::Note { .. } => RecordKind::Note,
            RecordBody::Todo { .. } => RecordKind::Todo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub family_id: FamilyId,
    pub creator_id: UserId,
    pub body: RecordBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: RecordId,
    pub family_id: FamilyId,
    pub creator_id: UserId,
    pub body: RecordBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update. `None` leaves the stored field, and its envelope, as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    Note {
        title_ciphertext: Option<String>,
        content_ciphertext: Option<String>,
        category: Option<NoteCategory>,
    },
    Todo {
        title_ciphertext: Option<String>,
        description_ciphertext: Option<String>,
        category: Option<TodoCategory>,
        is_completed: Option<bool>,
    },
}

impl RecordPatch {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPatch::Note { .. } => RecordKind::Note,
            RecordPatch::Todo { .. } => RecordKind::Todo,
        }
    }

    /// Apply to a body of the same kind. Returns `false` on a kind mismatch
    /// and leaves the body untouched.
    pub fn apply(self, body: &mut RecordBody) -> bool {
        match (self, body) {
            (
                RecordPatch::Note {
                    title_ciphertext,
                    content_ciphertext,
                    category,
                },
                RecordBody::Note {
                    title_ciphertext: title,
                    content_ciphertext: content,
                    category: cat,
                },
            ) => {
                if let Some(v) = title_ciphertext {
                    *title = v;
                }
                if let Some(v) = content_ciphertext {
                    *content = v;
                }
                if let Some(v) = category {
                    *cat = v;
                }
                true
            }
            (
                RecordPatch::Todo {
                    title_ciphertext,
                    description_ciphertext,
                    category,
                    is_completed,
                },
                RecordBody::Todo {
                    title_ciphertext: title,
                    description_ciphertext: description,
                    category: cat,
                    is_completed: done,
                },
            ) => {
                if let Some(v) = title_ciphertext {
                    *title = v;
                }
                if let Some(v) = description_ciphertext {
                    *description = Some(v);
                }
                if let Some(v) = category {
                    *cat = v;
                }
                if let Some(v) = is_completed {
                    *done = v;
                }
                true
            }
            _ => false,
        }
    }
}

/// Server-side filters over clear metadata only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordQuery {
    /// Newest `event_date` first, optionally within one calendar year
    Milestones { year: Option<i32> },
    /// Newest first, optionally one category
    Notes { category: Option<NoteCategory> },
    /// Newest first, optionally one category and/or completion state
    Todos {
        category: Option<TodoCategory>,
        completed: Option<bool>,
    },
}

impl RecordQuery {
    pub fn matches(&self, body: &RecordBody) -> bool {
        match (self, body) {
            (RecordQuery::Milestones { year }, RecordBody::Milestone { event_date, .. }) => {
                year.map_or(true, |y| event_date.year() == y)
            }
            (RecordQuery::Notes { category }, RecordBody::Note { category: c, .. }) => {
                category.map_or(true, |want| want == *c)
            }
            (
                RecordQuery::Todos {
                    category,
                    completed,
                },
                RecordBody::Todo {
                    category: c,
                    is_completed,
                    ..
                },
            ) => {
                category.map_or(true, |want| want == *c)
                    && completed.map_or(true, |want| want == *is_completed)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> RecordBody {
        RecordBody::Note {
            title_ciphertext: "t0".into(),
            content_ciphertext: "c0".into(),
            category: NoteCategory::Address,
        }
    }

    #[test]
    fn test_patch_touches_only_given_fields() {
        let mut body = note();
        let applied = RecordPatch::Note {
            title_ciphertext: Some("t1".into()),
            content_ciphertext: None,
            category: None,
        }
        .apply(&mut body);

        assert!(applied);
        assert_eq!(
            body,
            RecordBody::Note {
                title_ciphertext: "t1".into(),
                content_ciphertext: "c0".into(),
                category: NoteCategory::Address,
            }
        );
    }

    #[test]
    fn test_patch_kind_mismatch_is_rejected() {
        let mut body = note();
        let applied = RecordPatch::Todo {
            title_ciphertext: Some("x".into()),
            description_ciphertext: None,
            category: None,
            is_completed: Some(true),
        }
        .apply(&mut body);

        assert!(!applied);
        assert_eq!(body, note());
    }

    #[test]
    fn test_milestone_year_filter() {
        let body = RecordBody::Milestone {
            event_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            content_ciphertext: "c".into(),
        };
        assert!(RecordQuery::Milestones { year: None }.matches(&body));
        assert!(RecordQuery::Milestones { year: Some(2024) }.matches(&body));
        assert!(!RecordQuery::Milestones { year: Some(2025) }.matches(&body));
        assert!(!RecordQuery::Notes { category: None }.matches(&body));
    }

    #[test]
    fn test_body_serde_is_tagged_by_kind() {
        let json = serde_json::to_value(note()).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["category"], "address");
    }
}
