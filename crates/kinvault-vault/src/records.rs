//! Milestones, notes, and to-dos sealed under the family key
//!
//! Each text field is its own AES-256-GCM envelope, so an update re-seals
//! only the fields it changes. Dates, categories, and completion flags stay
//! in the clear for server-side filtering and ordering.

use chrono::{DateTime, NaiveDate, Utc};
use kinvault_core::{
    FamilyId, KinvaultError, NoteCategory, RecordId, RecordKind, TodoCategory, UserId,
};
use kinvault_crypto::FamilyKey;
use kinvault_store::{NewRecord, RecordBody, RecordPatch, RecordQuery, RecordRow, VaultStore};
use rand::{CryptoRng, RngCore};

use crate::error::VaultResult;
use crate::{Session, Vault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneDraft {
    pub event_date: NaiveDate,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: RecordId,
    pub family_id: FamilyId,
    pub creator_id: UserId,
    pub event_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<NoteCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: RecordId,
    pub family_id: FamilyId,
    pub creator_id: UserId,
    pub title: String,
    pub content: String,
    pub category: NoteCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: TodoCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TodoCategory>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: RecordId,
    pub family_id: FamilyId,
    pub creator_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub category: TodoCategory,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn seal_opt<R: RngCore + CryptoRng>(
    key: &FamilyKey,
    field: Option<&str>,
    rng: &mut R,
) -> VaultResult<Option<String>> {
    Ok(field.map(|f| key.seal_field(f, rng)).transpose()?)
}

fn open_milestone(key: &FamilyKey, row: RecordRow) -> VaultResult<Milestone> {
    match row.body {
        RecordBody::Milestone {
            event_date,
            content_ciphertext,
        } => Ok(Milestone {
            id: row.id,
            family_id: row.family_id,
            creator_id: row.creator_id,
            event_date,
            content: key.open_field(&content_ciphertext)?,
            created_at: row.created_at,
        }),
        _ => Err(KinvaultError::RecordNotFound(row.id).into()),
    }
}

fn open_note(key: &FamilyKey, row: RecordRow) -> VaultResult<Note> {
    match row.body {
        RecordBody::Note {
            title_ciphertext,
            content_ciphertext,
            category,
        } => Ok(Note {
            id: row.id,
            family_id: row.family_id,
            creator_id: row.creator_id,
            title: key.open_field(&title_ciphertext)?,
            content: key.open_field(&content_ciphertext)?,
            category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }),
        _ => Err(KinvaultError::RecordNotFound(row.id).into()),
    }
}

fn open_todo(key: &FamilyKey, row: RecordRow) -> VaultResult<Todo> {
    match row.body {
        RecordBody::Todo {
            title_ciphertext,
            description_ciphertext,
            category,
            is_completed,
        } => Ok(Todo {
            id: row.id,
            family_id: row.family_id,
            creator_id: row.creator_id,
            title: key.open_field(&title_ciphertext)?,
            description: description_ciphertext
                .as_deref()
                .map(|d| key.open_field(d))
                .transpose()?,
            category,
            is_completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }),
        _ => Err(KinvaultError::RecordNotFound(row.id).into()),
    }
}

impl<S: VaultStore> Vault<S> {
    /// Look up a record of the given kind that the caller may touch.
    fn member_record(
        &self,
        session: &Session,
        id: RecordId,
        kind: RecordKind,
    ) -> VaultResult<RecordRow> {
        let row = self
            .store()
            .record(id)?
            .filter(|r| r.body.kind() == kind)
            .ok_or(KinvaultError::RecordNotFound(id))?;
        self.capability(session, row.family_id)?.require_member()?;
        Ok(row)
    }

    fn insert_sealed(
        &self,
        session: &Session,
        family: FamilyId,
        body: RecordBody,
    ) -> VaultResult<RecordRow> {
        let row = self.store().insert_record(NewRecord {
            family_id: family,
            creator_id: session.user_id(),
            body,
        })?;
        tracing::info!(
            record_id = %row.id,
            family_id = %family,
            kind = %row.body.kind(),
            "stored sealed record"
        );
        Ok(row)
    }

    // Milestones

    pub fn add_milestone<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        family: FamilyId,
        draft: MilestoneDraft,
        rng: &mut R,
    ) -> VaultResult<Milestone> {
        let key = self.family_key(session, family)?;
        let body = RecordBody::Milestone {
            event_date: draft.event_date,
            content_ciphertext: key.seal_field(&draft.content, rng)?,
        };
        let row = self.insert_sealed(session, family, body)?;
        open_milestone(&key, row)
    }

    /// Newest event first, optionally limited to one calendar year.
    pub fn milestones(
        &self,
        session: &Session,
        family: FamilyId,
        year: Option<i32>,
    ) -> VaultResult<Vec<Milestone>> {
        let key = self.family_key(session, family)?;
        self.store()
            .list_records(family, RecordQuery::Milestones { year })?
            .into_iter()
            .map(|row| open_milestone(&key, row))
            .collect()
    }

    // Notes

    pub fn add_note<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        family: FamilyId,
        draft: NoteDraft,
        rng: &mut R,
    ) -> VaultResult<Note> {
        let key = self.family_key(session, family)?;
        let body = RecordBody::Note {
            title_ciphertext: key.seal_field(&draft.title, rng)?,
            content_ciphertext: key.seal_field(&draft.content, rng)?,
            category: draft.category,
        };
        let row = self.insert_sealed(session, family, body)?;
        open_note(&key, row)
    }

    /// Newest first, optionally one category.
    pub fn notes(
        &self,
        session: &Session,
        family: FamilyId,
        category: Option<NoteCategory>,
    ) -> VaultResult<Vec<Note>> {
        let key = self.family_key(session, family)?;
        self.store()
            .list_records(family, RecordQuery::Notes { category })?
            .into_iter()
            .map(|row| open_note(&key, row))
            .collect()
    }

    /// Re-seal only the fields present in `update`.
    pub fn update_note<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        id: RecordId,
        update: NoteUpdate,
        rng: &mut R,
    ) -> VaultResult<Note> {
        let row = self.member_record(session, id, RecordKind::Note)?;
        let key = self.family_key(session, row.family_id)?;
        let patch = RecordPatch::Note {
            title_ciphertext: seal_opt(&key, update.title.as_deref(), rng)?,
            content_ciphertext: seal_opt(&key, update.content.as_deref(), rng)?,
            category: update.category,
        };
        let row = self.store().update_record(id, patch)?;
        tracing::info!(record_id = %id, family_id = %row.family_id, "updated note");
        open_note(&key, row)
    }

    pub fn delete_note(&self, session: &Session, id: RecordId) -> VaultResult<()> {
        let row = self.member_record(session, id, RecordKind::Note)?;
        self.store().delete_record(id)?;
        tracing::info!(record_id = %id, family_id = %row.family_id, "deleted note");
        Ok(())
    }

    // To-dos

    pub fn add_todo<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        family: FamilyId,
        draft: TodoDraft,
        rng: &mut R,
    ) -> VaultResult<Todo> {
        let key = self.family_key(session, family)?;
        let body = RecordBody::Todo {
            title_ciphertext: key.seal_field(&draft.title, rng)?,
            description_ciphertext: seal_opt(&key, draft.description.as_deref(), rng)?,
            category: draft.category,
            is_completed: false,
        };
        let row = self.insert_sealed(session, family, body)?;
        open_todo(&key, row)
    }

    /// Newest first, optionally filtered by category and completion.
    pub fn todos(
        &self,
        session: &Session,
        family: FamilyId,
        category: Option<TodoCategory>,
        completed: Option<bool>,
    ) -> VaultResult<Vec<Todo>> {
        let key = self.family_key(session, family)?;
        self.store()
            .list_records(
                family,
                RecordQuery::Todos {
                    category,
                    completed,
                },
            )?
            .into_iter()
            .map(|row| open_todo(&key, row))
            .collect()
    }

    /// Re-seal only the fields present in `update`.
    pub fn update_todo<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        id: RecordId,
        update: TodoUpdate,
        rng: &mut R,
    ) -> VaultResult<Todo> {
        let row = self.member_record(session, id, RecordKind::Todo)?;
        let key = self.family_key(session, row.family_id)?;
        let patch = RecordPatch::Todo {
            title_ciphertext: seal_opt(&key, update.title.as_deref(), rng)?,
            description_ciphertext: seal_opt(&key, update.description.as_deref(), rng)?,
            category: update.category,
            is_completed: update.is_completed,
        };
        let row = self.store().update_record(id, patch)?;
        tracing::info!(record_id = %id, family_id = %row.family_id, "updated to-do");
        open_todo(&key, row)
    }

    pub fn delete_todo(&self, session: &Session, id: RecordId) -> VaultResult<()> {
        let row = self.member_record(session, id, RecordKind::Todo)?;
        self.store().delete_record(id)?;
        tracing::info!(record_id = %id, family_id = %row.family_id, "deleted to-do");
        Ok(())
    }
}
