//! Local store: every table in memory behind one lock, optionally persisted
//! to a JSON file.
//!
//! A file-backed store is shared with any other process that opens the same
//! path. Each call takes an OS lock on a sibling `<file>.lock` (shared for
//! reads, exclusive for writes) and re-reads the file under it, so a write
//! always checks against the latest rows on disk. A write then flushes via
//! temp+rename before the lock is released. A failed flush rolls the
//! in-memory tables back, so memory never runs ahead of disk.

use anyhow::Context;
use chrono::Utc;
use fs4::fs_std::FileExt;
use kinvault_core::{FamilyId, KinvaultError, KinvaultResult, RecordId, Role, UserId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::rows::{
    Credentials, FamilyRow, MembershipRow, NewRecord, NewUser, RecordPatch, RecordQuery,
    RecordRow, UserRow,
};
use crate::store::VaultStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    next_user_id: u64,
    next_family_id: u64,
    next_record_id: u64,
    users: Vec<UserRow>,
    families: Vec<FamilyRow>,
    memberships: Vec<MembershipRow>,
    records: Vec<RecordRow>,
}

impl Tables {
    fn user(&self, id: UserId) -> Option<&UserRow> {
        self.users.iter().find(|u| u.id == id)
    }

    fn family(&self, id: FamilyId) -> Option<&FamilyRow> {
        self.families.iter().find(|f| f.id == id)
    }

    fn membership(&self, family: FamilyId, user: UserId) -> Option<&MembershipRow> {
        self.memberships
            .iter()
            .find(|m| m.family_id == family && m.user_id == user)
    }
}

/// In-memory [`VaultStore`], optionally persisted to a JSON file
pub struct LocalStore {
    /// Path to the JSON file on disk, `None` for a purely in-memory store
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        LocalStore {
            path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Load or create a store at the given path.
    /// If the file doesn't exist, starts empty; it is created on first write.
    pub fn open(path: &Path) -> KinvaultResult<Self> {
        let tables = {
            let _guard = FileLock::shared(path)?;
            load(path)?
        };

        tracing::debug!(
            path = %path.display(),
            users = tables.users.len(),
            families = tables.families.len(),
            records = tables.records.len(),
            "opened vault store"
        );

        Ok(LocalStore {
            path: Some(path.to_path_buf()),
            tables: Mutex::new(tables),
        })
    }

    fn lock(&self) -> KinvaultResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| KinvaultError::Storage("vault store lock poisoned".into()))
    }

    fn read<T>(&self, op: impl FnOnce(&Tables) -> T) -> KinvaultResult<T> {
        let mut tables = self.lock()?;
        if let Some(path) = &self.path {
            let _guard = FileLock::shared(path)?;
            *tables = load(path)?;
        }
        Ok(op(&tables))
    }

    /// Run `op` as one transaction. `op` must do all of its checks before its
    /// first write.
    fn write<T>(&self, op: impl FnOnce(&mut Tables) -> KinvaultResult<T>) -> KinvaultResult<T> {
        let mut tables = self.lock()?;
        let Some(path) = &self.path else {
            return op(&mut tables);
        };

        let _guard = FileLock::exclusive(path)?;
        *tables = load(path)?;

        let before = tables.clone();
        let out = op(&mut tables)?;
        if let Err(e) = flush(path, &tables) {
            tracing::warn!(path = %path.display(), "vault store flush failed, rolling back: {e}");
            *tables = before;
            return Err(e);
        }
        Ok(out)
    }
}

/// OS advisory lock on `<file>.lock` next to the store. Released on drop.
struct FileLock {
    _file: File,
}

impl FileLock {
    fn shared(path: &Path) -> KinvaultResult<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file)
            .with_context(|| format!("locking vault store: {}", path.display()))?;
        Ok(FileLock { _file: file })
    }

    fn exclusive(path: &Path) -> KinvaultResult<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("locking vault store: {}", path.display()))?;
        Ok(FileLock { _file: file })
    }
}

fn open_lock_file(path: &Path) -> KinvaultResult<File> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            KinvaultError::Storage(format!("invalid store path: {}", path.display()))
        })?;
    let lock_path = path.with_file_name(format!("{file_name}.lock"));

    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating store dir: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("opening store lock: {}", lock_path.display()))?;
    Ok(file)
}

/// Current tables on disk; an absent file is an empty store
fn load(path: &Path) -> KinvaultResult<Tables> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)
            .with_context(|| format!("parsing vault store: {}", path.display()))?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tables::default()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("reading vault store: {}", path.display()))
            .into()),
    }
}

/// Atomic write: write to temp file, then rename
fn flush(path: &Path, tables: &Tables) -> KinvaultResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating store dir: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(tables).context("serializing vault store")?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("writing vault store temp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming vault store: {}", path.display()))?;
    Ok(())
}

impl VaultStore for LocalStore {
    fn insert_user(&self, user: NewUser) -> KinvaultResult<UserRow> {
        self.write(|t| {
            if t.users.iter().any(|u| u.phone == user.phone) {
                return Err(KinvaultError::UserExists(user.phone));
            }
            t.next_user_id += 1;
            let row = UserRow {
                id: UserId(t.next_user_id),
                phone: user.phone,
                username: user.username,
                credentials: user.credentials,
                created_at: Utc::now(),
            };
            t.users.push(row.clone());
            tracing::debug!(user_id = %row.id, "inserted user");
            Ok(row)
        })
    }

    fn user(&self, id: UserId) -> KinvaultResult<Option<UserRow>> {
        self.read(|t| t.user(id).cloned())
    }

    fn user_by_phone(&self, phone: &str) -> KinvaultResult<Option<UserRow>> {
        self.read(|t| t.users.iter().find(|u| u.phone == phone).cloned())
    }

    fn update_credentials(&self, id: UserId, credentials: Credentials) -> KinvaultResult<()> {
        self.write(|t| {
            let user = t
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| KinvaultError::UserNotFound(id.to_string()))?;
            user.credentials = credentials;
            tracing::debug!(user_id = %id, "replaced user credentials");
            Ok(())
        })
    }

    fn create_family(
        &self,
        name: &str,
        owner: UserId,
        owner_role: Role,
        owner_wrapped_key: String,
    ) -> KinvaultResult<(FamilyRow, MembershipRow)> {
        self.write(|t| {
            if t.user(owner).is_none() {
                return Err(KinvaultError::UserNotFound(owner.to_string()));
            }
            let now = Utc::now();
            t.next_family_id += 1;
            let family = FamilyRow {
                id: FamilyId(t.next_family_id),
                name: name.to_string(),
                owner_id: owner,
                created_at: now,
            };
            let membership = MembershipRow {
                family_id: family.id,
                user_id: owner,
                role: owner_role,
                encrypted_family_key: owner_wrapped_key,
                joined_at: now,
            };
            t.families.push(family.clone());
            t.memberships.push(membership.clone());
            tracing::debug!(family_id = %family.id, user_id = %owner, "created family");
            Ok((family, membership))
        })
    }

    fn family(&self, id: FamilyId) -> KinvaultResult<Option<FamilyRow>> {
        self.read(|t| t.family(id).cloned())
    }

    fn insert_membership(&self, row: MembershipRow) -> KinvaultResult<MembershipRow> {
        self.write(|t| {
            if t.family(row.family_id).is_none() {
                return Err(KinvaultError::FamilyNotFound(row.family_id));
            }
            if t.user(row.user_id).is_none() {
                return Err(KinvaultError::UserNotFound(row.user_id.to_string()));
            }
            if t.membership(row.family_id, row.user_id).is_some() {
                return Err(KinvaultError::AlreadyMember {
                    family: row.family_id,
                    user: row.user_id,
                });
            }
            t.memberships.push(row.clone());
            tracing::debug!(
                family_id = %row.family_id,
                user_id = %row.user_id,
                role = %row.role,
                "inserted membership"
            );
            Ok(row)
        })
    }

    fn membership(&self, family: FamilyId, user: UserId) -> KinvaultResult<Option<MembershipRow>> {
        self.read(|t| t.membership(family, user).cloned())
    }

    fn members(&self, family: FamilyId) -> KinvaultResult<Vec<MembershipRow>> {
        self.read(|t| {
            t.memberships
                .iter()
                .filter(|m| m.family_id == family)
                .cloned()
                .collect()
        })
    }

    fn memberships_for_user(
        &self,
        user: UserId,
    ) -> KinvaultResult<Vec<(FamilyRow, MembershipRow)>> {
        self.read(|t| {
            t.memberships
                .iter()
                .filter(|m| m.user_id == user)
                .filter_map(|m| t.family(m.family_id).map(|f| (f.clone(), m.clone())))
                .collect()
        })
    }

    fn insert_record(&self, record: NewRecord) -> KinvaultResult<RecordRow> {
        self.write(|t| {
            if t.family(record.family_id).is_none() {
                return Err(KinvaultError::FamilyNotFound(record.family_id));
            }
            let now = Utc::now();
            t.next_record_id += 1;
            let row = RecordRow {
                id: RecordId(t.next_record_id),
                family_id: record.family_id,
                creator_id: record.creator_id,
                body: record.body,
                created_at: now,
                updated_at: now,
            };
            t.records.push(row.clone());
            tracing::debug!(
                record_id = %row.id,
                family_id = %row.family_id,
                kind = %row.body.kind(),
                "inserted record"
            );
            Ok(row)
        })
    }

    fn record(&self, id: RecordId) -> KinvaultResult<Option<RecordRow>> {
        self.read(|t| t.records.iter().find(|r| r.id == id).cloned())
    }

    fn update_record(&self, id: RecordId, patch: RecordPatch) -> KinvaultResult<RecordRow> {
        self.write(|t| {
            let row = t
                .records
                .iter_mut()
                .find(|r| r.id == id && r.body.kind() == patch.kind())
                .ok_or(KinvaultError::RecordNotFound(id))?;
            if !patch.apply(&mut row.body) {
                return Err(KinvaultError::RecordNotFound(id));
            }
            row.updated_at = Utc::now();
            tracing::debug!(record_id = %id, kind = %row.body.kind(), "updated record");
            Ok(row.clone())
        })
    }

    fn delete_record(&self, id: RecordId) -> KinvaultResult<()> {
        self.write(|t| {
            let idx = t
                .records
                .iter()
                .position(|r| r.id == id)
                .ok_or(KinvaultError::RecordNotFound(id))?;
            let row = t.records.remove(idx);
            tracing::debug!(record_id = %id, kind = %row.body.kind(), "deleted record");
            Ok(())
        })
    }

    fn list_records(
        &self,
        family: FamilyId,
        query: RecordQuery,
    ) -> KinvaultResult<Vec<RecordRow>> {
        self.read(|t| {
            let mut rows: Vec<RecordRow> = t
                .records
                .iter()
                .filter(|r| r.family_id == family && query.matches(&r.body))
                .cloned()
                .collect();

            match query {
                RecordQuery::Milestones { .. } => rows.sort_by(|a, b| {
                    milestone_date(b)
                        .cmp(&milestone_date(a))
                        .then(b.id.cmp(&a.id))
                }),
                RecordQuery::Notes { .. } | RecordQuery::Todos { .. } => rows.sort_by(|a, b| {
                    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
                }),
            }
            rows
        })
    }
}

fn milestone_date(row: &RecordRow) -> Option<chrono::NaiveDate> {
    match &row.body {
        crate::rows::RecordBody::Milestone { event_date, .. } => Some(*event_date),
        _ => None,
    }
}
