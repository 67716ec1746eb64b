//! Membership-based access control.
//!
//! Capability is two booleans read from current store state on every call:
//! is the actor a member, and is the actor the family's owner. The member's
//! role label is never consulted.

use kinvault_core::{FamilyId, KinvaultError, KinvaultResult, UserId};
use kinvault_store::VaultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub family: FamilyId,
    pub user: UserId,
    pub is_member: bool,
    pub is_owner: bool,
}

impl Capability {
    /// Evaluate against the store now. Fails with `FamilyNotFound` for an
    /// unknown family.
    pub fn evaluate<S: VaultStore + ?Sized>(
        store: &S,
        family: FamilyId,
        user: UserId,
    ) -> KinvaultResult<Self> {
        let row = store
            .family(family)?
            .ok_or(KinvaultError::FamilyNotFound(family))?;
        let is_member = store.membership(family, user)?.is_some();
        Ok(Capability {
            family,
            user,
            is_member,
            is_owner: row.owner_id == user,
        })
    }

    /// Reading or writing any of the family's records
    pub fn require_member(&self) -> KinvaultResult<()> {
        if self.is_member {
            Ok(())
        } else {
            tracing::debug!(
                family_id = %self.family,
                user_id = %self.user,
                "denied: not a member"
            );
            Err(KinvaultError::NotAMember {
                family: self.family,
                user: self.user,
            })
        }
    }

    /// Granting the family key to someone new
    pub fn require_owner(&self) -> KinvaultResult<()> {
        if self.is_owner && self.is_member {
            Ok(())
        } else {
            tracing::debug!(
                family_id = %self.family,
                user_id = %self.user,
                "denied: not the owner"
            );
            Err(KinvaultError::NotOwner {
                family: self.family,
                user: self.user,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinvault_core::Role;
    use kinvault_crypto::KdfParams;
    use kinvault_store::{Credentials, LocalStore, MembershipRow, NewUser};

    fn user(store: &LocalStore, phone: &str) -> UserId {
        store
            .insert_user(NewUser {
                phone: phone.into(),
                username: phone.into(),
                credentials: Credentials {
                    password_hash: String::new(),
                    public_key: String::new(),
                    encrypted_private_key: String::new(),
                    private_key_salt: String::new(),
                    kdf: KdfParams::default(),
                },
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_capability_tracks_current_state() {
        let store = LocalStore::in_memory();
        let owner = user(&store, "1");
        let other = user(&store, "2");
        let (family, _) = store
            .create_family("Smiths", owner, Role::Husband, "k".into())
            .unwrap();

        let owner_cap = Capability::evaluate(&store, family.id, owner).unwrap();
        assert!(owner_cap.require_member().is_ok());
        assert!(owner_cap.require_owner().is_ok());

        let before = Capability::evaluate(&store, family.id, other).unwrap();
        assert!(matches!(
            before.require_member(),
            Err(KinvaultError::NotAMember { .. })
        ));

        store
            .insert_membership(MembershipRow {
                family_id: family.id,
                user_id: other,
                role: Role::Father,
                encrypted_family_key: "k2".into(),
                joined_at: chrono::Utc::now(),
            })
            .unwrap();

        let after = Capability::evaluate(&store, family.id, other).unwrap();
        assert!(after.require_member().is_ok());
        // A senior-sounding role label grants nothing extra
        assert!(matches!(
            after.require_owner(),
            Err(KinvaultError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_unknown_family() {
        let store = LocalStore::in_memory();
        let owner = user(&store, "1");
        assert!(matches!(
            Capability::evaluate(&store, FamilyId(42), owner),
            Err(KinvaultError::FamilyNotFound(_))
        ));
    }
}
