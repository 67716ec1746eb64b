//! LocalStore behaviour: uniqueness at the storage boundary, atomic
//! family+membership writes, JSON persistence shared between handles, and
//! list ordering.

use std::sync::Arc;

use chrono::NaiveDate;
use kinvault_core::{KinvaultError, NoteCategory, Role, TodoCategory, UserId};
use kinvault_crypto::KdfParams;
use kinvault_store::{
    Credentials, LocalStore, MembershipRow, NewRecord, NewUser, RecordBody, RecordPatch,
    RecordQuery, VaultStore,
};

fn new_user(phone: &str) -> NewUser {
    NewUser {
        phone: phone.into(),
        username: format!("user-{phone}"),
        credentials: Credentials {
            password_hash: "$argon2id$stub".into(),
            public_key: "-----BEGIN PUBLIC KEY-----\n...".into(),
            encrypted_private_key: "AAAA".into(),
            private_key_salt: "BBBB".into(),
            kdf: KdfParams::default(),
        },
    }
}

fn membership(family: kinvault_core::FamilyId, user: UserId) -> MembershipRow {
    MembershipRow {
        family_id: family,
        user_id: user,
        role: Role::Son,
        encrypted_family_key: format!("wrapped-for-{user}"),
        joined_at: chrono::Utc::now(),
    }
}

fn milestone(family: kinvault_core::FamilyId, creator: UserId, date: (i32, u32, u32)) -> NewRecord {
    NewRecord {
        family_id: family,
        creator_id: creator,
        body: RecordBody::Milestone {
            event_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            content_ciphertext: format!("ct-{}-{}-{}", date.0, date.1, date.2),
        },
    }
}

#[test]
fn duplicate_phone_rejected() {
    let store = LocalStore::in_memory();
    store.insert_user(new_user("13800000001")).unwrap();

    let err = store.insert_user(new_user("13800000001")).unwrap_err();
    assert!(matches!(err, KinvaultError::UserExists(p) if p == "13800000001"));
}

#[test]
fn create_family_writes_owner_membership() {
    let store = LocalStore::in_memory();
    let owner = store.insert_user(new_user("13800000001")).unwrap();

    let (family, m) = store
        .create_family("Smiths", owner.id, Role::Husband, "owner-wrapped".into())
        .unwrap();

    assert_eq!(family.owner_id, owner.id);
    assert_eq!(m.role, Role::Husband);
    assert_eq!(
        store.membership(family.id, owner.id).unwrap().unwrap().encrypted_family_key,
        "owner-wrapped"
    );
    let mine = store.memberships_for_user(owner.id).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].0.name, "Smiths");
}

#[test]
fn duplicate_membership_rejected() {
    let store = LocalStore::in_memory();
    let owner = store.insert_user(new_user("13800000001")).unwrap();
    let member = store.insert_user(new_user("13800000002")).unwrap();
    let (family, _) = store
        .create_family("Smiths", owner.id, Role::Wife, "k".into())
        .unwrap();

    store.insert_membership(membership(family.id, member.id)).unwrap();
    let err = store
        .insert_membership(membership(family.id, member.id))
        .unwrap_err();
    assert!(matches!(err, KinvaultError::AlreadyMember { .. }));

    // The owner cannot be re-added either
    let err = store
        .insert_membership(membership(family.id, owner.id))
        .unwrap_err();
    assert!(matches!(err, KinvaultError::AlreadyMember { .. }));
    assert_eq!(store.members(family.id).unwrap().len(), 2);
}

#[test]
fn concurrent_add_member_only_one_wins() {
    let store = Arc::new(LocalStore::in_memory());
    let owner = store.insert_user(new_user("13800000001")).unwrap();
    let member = store.insert_user(new_user("13800000002")).unwrap();
    let (family, _) = store
        .create_family("Smiths", owner.id, Role::Husband, "k".into())
        .unwrap();

    let (family_id, member_id) = (family.id, member.id);
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.insert_membership(membership(family_id, member_id)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one concurrent add must succeed");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, KinvaultError::AlreadyMember { .. })));
    assert_eq!(store.members(family.id).unwrap().len(), 2);
}

#[test]
fn membership_requires_existing_family_and_user() {
    let store = LocalStore::in_memory();
    let owner = store.insert_user(new_user("13800000001")).unwrap();
    let (family, _) = store
        .create_family("Smiths", owner.id, Role::Husband, "k".into())
        .unwrap();

    let err = store
        .insert_membership(membership(kinvault_core::FamilyId(99), owner.id))
        .unwrap_err();
    assert!(matches!(err, KinvaultError::FamilyNotFound(_)));

    let err = store
        .insert_membership(membership(family.id, UserId(99)))
        .unwrap_err();
    assert!(matches!(err, KinvaultError::UserNotFound(_)));
}

#[test]
fn json_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("vault.json");

    let family_id = {
        let store = LocalStore::open(&path).unwrap();
        let owner = store.insert_user(new_user("13800000001")).unwrap();
        let (family, _) = store
            .create_family("Smiths", owner.id, Role::Husband, "k".into())
            .unwrap();
        store
            .insert_record(milestone(family.id, owner.id, (2024, 5, 1)))
            .unwrap();
        family.id
    };

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists(), "temp file must be renamed away");

    let reopened = LocalStore::open(&path).unwrap();
    let owner = reopened.user_by_phone("13800000001").unwrap().unwrap();
    assert_eq!(owner.credentials.kdf, KdfParams::default());
    assert_eq!(
        reopened
            .list_records(family_id, RecordQuery::Milestones { year: None })
            .unwrap()
            .len(),
        1
    );

    // Ids keep counting from where they left off
    let second = reopened.insert_user(new_user("13800000002")).unwrap();
    assert_eq!(second.id, UserId(2));
}

#[test]
fn failed_flush_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");
    // A directory where the temp file should go makes every flush fail
    std::fs::create_dir(path.with_extension("tmp")).unwrap();

    let store = LocalStore::open(&path).unwrap();
    assert!(store.insert_user(new_user("13800000001")).is_err());
    assert!(store.user_by_phone("13800000001").unwrap().is_none());
    assert!(!path.exists());
}

#[test]
fn handles_on_one_file_see_each_others_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");

    let first = LocalStore::open(&path).unwrap();
    let second = LocalStore::open(&path).unwrap();

    let a = first.insert_user(new_user("13800000003")).unwrap();
    let b = second.insert_user(new_user("13800000004")).unwrap();
    assert_ne!(a.id, b.id, "second handle must allocate after the first's row");
    assert!(second.user_by_phone("13800000003").unwrap().is_some());

    let reopened = LocalStore::open(&path).unwrap();
    assert!(reopened.user_by_phone("13800000003").unwrap().is_some());
    assert!(reopened.user_by_phone("13800000004").unwrap().is_some());
}

#[test]
fn duplicate_membership_rejected_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");

    let (family_id, member_id) = {
        let setup = LocalStore::open(&path).unwrap();
        let owner = setup.insert_user(new_user("13800000001")).unwrap();
        let member = setup.insert_user(new_user("13800000002")).unwrap();
        let (family, _) = setup
            .create_family("Smiths", owner.id, Role::Husband, "k".into())
            .unwrap();
        (family.id, member.id)
    };

    let first = LocalStore::open(&path).unwrap();
    let second = LocalStore::open(&path).unwrap();
    first
        .insert_membership(membership(family_id, member_id))
        .unwrap();
    let err = second
        .insert_membership(membership(family_id, member_id))
        .unwrap_err();
    assert!(matches!(err, KinvaultError::AlreadyMember { .. }));
    assert_eq!(LocalStore::open(&path).unwrap().members(family_id).unwrap().len(), 2);
}

#[test]
fn concurrent_add_member_across_handles_only_one_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");

    let (family_id, member_id) = {
        let setup = LocalStore::open(&path).unwrap();
        let owner = setup.insert_user(new_user("13800000001")).unwrap();
        let member = setup.insert_user(new_user("13800000002")).unwrap();
        let (family, _) = setup
            .create_family("Smiths", owner.id, Role::Husband, "k".into())
            .unwrap();
        (family.id, member.id)
    };

    // Each thread opens its own handle, as separate CLI invocations would
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let store = LocalStore::open(&path).unwrap();
                store.insert_membership(membership(family_id, member_id))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, KinvaultError::AlreadyMember { .. })));
    assert_eq!(LocalStore::open(&path).unwrap().members(family_id).unwrap().len(), 2);
}

#[test]
fn milestones_by_year_newest_first() {
    let store = LocalStore::in_memory();
    let owner = store.insert_user(new_user("13800000001")).unwrap();
    let (family, _) = store
        .create_family("Smiths", owner.id, Role::Husband, "k".into())
        .unwrap();

    for date in [(2023, 7, 1), (2024, 1, 5), (2024, 11, 20), (2024, 3, 3)] {
        store.insert_record(milestone(family.id, owner.id, date)).unwrap();
    }

    let dates: Vec<_> = store
        .list_records(family.id, RecordQuery::Milestones { year: Some(2024) })
        .unwrap()
        .into_iter()
        .map(|r| match r.body {
            RecordBody::Milestone { event_date, .. } => event_date.to_string(),
            other => panic!("unexpected body: {other:?}"),
        })
        .collect();
    assert_eq!(dates, ["2024-11-20", "2024-03-03", "2024-01-05"]);
}

#[test]
fn notes_and_todos_filter_and_update() {
    let store = LocalStore::in_memory();
    let owner = store.insert_user(new_user("13800000001")).unwrap();
    let (family, _) = store
        .create_family("Smiths", owner.id, Role::Husband, "k".into())
        .unwrap();

    let note = store
        .insert_record(NewRecord {
            family_id: family.id,
            creator_id: owner.id,
            body: RecordBody::Note {
                title_ciphertext: "t".into(),
                content_ciphertext: "c".into(),
                category: NoteCategory::Prescription,
            },
        })
        .unwrap();
    let todo = store
        .insert_record(NewRecord {
            family_id: family.id,
            creator_id: owner.id,
            body: RecordBody::Todo {
                title_ciphertext: "t".into(),
                description_ciphertext: None,
                category: TodoCategory::Wish,
                is_completed: false,
            },
        })
        .unwrap();

    let notes = store
        .list_records(
            family.id,
            RecordQuery::Notes {
                category: Some(NoteCategory::Address),
            },
        )
        .unwrap();
    assert!(notes.is_empty());

    // A note id is not a to-do
    let err = store
        .update_record(
            note.id,
            RecordPatch::Todo {
                title_ciphertext: None,
                description_ciphertext: None,
                category: None,
                is_completed: Some(true),
            },
        )
        .unwrap_err();
    assert!(matches!(err, KinvaultError::RecordNotFound(_)));

    let updated = store
        .update_record(
            todo.id,
            RecordPatch::Todo {
                title_ciphertext: None,
                description_ciphertext: Some("d".into()),
                category: None,
                is_completed: Some(true),
            },
        )
        .unwrap();
    assert!(updated.updated_at >= todo.updated_at);
    assert_eq!(
        updated.body,
        RecordBody::Todo {
            title_ciphertext: "t".into(),
            description_ciphertext: Some("d".into()),
            category: TodoCategory::Wish,
            is_completed: true,
        }
    );

    let done = store
        .list_records(
            family.id,
            RecordQuery::Todos {
                category: None,
                completed: Some(true),
            },
        )
        .unwrap();
    assert_eq!(done.len(), 1);

    store.delete_record(note.id).unwrap();
    assert!(store.record(note.id).unwrap().is_none());
    assert!(matches!(
        store.delete_record(note.id),
        Err(KinvaultError::RecordNotFound(_))
    ));
}
