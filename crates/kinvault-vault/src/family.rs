//! Family creation and family key distribution
//!
//! A family key is minted once, on creation, and wrapped for the owner. Each
//! member added later gets the same key wrapped under their own public key.
//! The key only ever exists unwrapped inside the member's process.

use kinvault_core::{FamilyId, KinvaultError, Role, UserId};
use kinvault_crypto::{
    mint_family_key, unwrap_family_key, wrap_for_member, FamilyKey, PublicIdentity,
    WrappedFamilyKey,
};
use kinvault_store::{FamilyRow, MembershipRow, VaultStore};
use rand::{CryptoRng, RngCore};

use crate::error::VaultResult;
use crate::{Session, Vault};

/// One of the caller's families, with the caller's own grant
#[derive(Debug, Clone)]
pub struct MyFamily {
    pub family: FamilyRow,
    pub role: Role,
    pub encrypted_family_key: String,
    pub is_owner: bool,
}

/// A member as shown to other members
#[derive(Debug, Clone)]
pub struct FamilyMember {
    pub user_id: UserId,
    pub phone: String,
    pub username: String,
    pub role: Role,
    pub is_owner: bool,
    /// Short fingerprint of the member's public key, for comparing out of band
    pub fingerprint: String,
}

impl<S: VaultStore> Vault<S> {
    /// Create a family owned by the caller and wrap a fresh family key for
    /// them. Only a household-head role may found a family.
    pub fn create_family<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        name: &str,
        role: Role,
        rng: &mut R,
    ) -> VaultResult<FamilyRow> {
        if !role.is_household_head() {
            return Err(KinvaultError::InvalidRole(format!(
                "a family must be created as husband or wife, not {role}"
            ))
            .into());
        }

        let key = mint_family_key(rng);
        let wrapped = wrap_for_member(&key, session.identity().public(), rng)?;
        let (family, _) = self
            .store()
            .create_family(name, session.user_id(), role, wrapped.to_b64())?;

        tracing::info!(family_id = %family.id, user_id = %session.user_id(), "created family");
        Ok(family)
    }

    /// Unwrap the caller's copy of a family key.
    pub fn family_key(&self, session: &Session, family: FamilyId) -> VaultResult<FamilyKey> {
        self.capability(session, family)?.require_member()?;
        let row = self
            .store()
            .membership(family, session.user_id())?
            .ok_or(KinvaultError::NotAMember {
                family,
                user: session.user_id(),
            })?;
        let wrapped = WrappedFamilyKey::from_b64(&row.encrypted_family_key)?;
        Ok(unwrap_family_key(&wrapped, session.identity())?)
    }

    /// Grant the family key to the user registered under `phone`.
    ///
    /// Owner only. An existing member is rejected before anything is
    /// wrapped; the store re-checks when the row and wrapped key are written
    /// together, so a concurrent duplicate grant also fails.
    pub fn add_member<R: RngCore + CryptoRng>(
        &self,
        session: &Session,
        family: FamilyId,
        phone: &str,
        role: Role,
        rng: &mut R,
    ) -> VaultResult<MembershipRow> {
        self.capability(session, family)?.require_owner()?;

        let target = self
            .store()
            .user_by_phone(phone)?
            .ok_or_else(|| KinvaultError::UserNotFound(phone.to_string()))?;
        if self.store().membership(family, target.id)?.is_some() {
            return Err(KinvaultError::AlreadyMember {
                family,
                user: target.id,
            }
            .into());
        }

        let key = self.family_key(session, family)?;
        let public = PublicIdentity::from_pem(&target.credentials.public_key)?;
        let wrapped = wrap_for_member(&key, &public, rng)?;

        let row = self.store().insert_membership(MembershipRow {
            family_id: family,
            user_id: target.id,
            role,
            encrypted_family_key: wrapped.to_b64(),
            joined_at: chrono::Utc::now(),
        })?;
        tracing::info!(
            family_id = %family,
            user_id = %target.id,
            role = %role,
            "added family member"
        );
        Ok(row)
    }

    /// Every family the caller belongs to.
    pub fn my_families(&self, session: &Session) -> VaultResult<Vec<MyFamily>> {
        Ok(self
            .store()
            .memberships_for_user(session.user_id())?
            .into_iter()
            .map(|(family, m)| MyFamily {
                is_owner: family.owner_id == session.user_id(),
                family,
                role: m.role,
                encrypted_family_key: m.encrypted_family_key,
            })
            .collect())
    }

    /// Members of a family. Members only.
    pub fn family_members(
        &self,
        session: &Session,
        family: FamilyId,
    ) -> VaultResult<Vec<FamilyMember>> {
        self.capability(session, family)?.require_member()?;
        let owner = self
            .store()
            .family(family)?
            .ok_or(KinvaultError::FamilyNotFound(family))?
            .owner_id;

        let mut members = Vec::new();
        for m in self.store().members(family)? {
            let user = self
                .store()
                .user(m.user_id)?
                .ok_or_else(|| KinvaultError::UserNotFound(m.user_id.to_string()))?;
            let fingerprint =
                PublicIdentity::from_pem(&user.credentials.public_key)?.fingerprint()?;
            members.push(FamilyMember {
                user_id: user.id,
                phone: user.phone,
                username: user.username,
                role: m.role,
                is_owner: user.id == owner,
                fingerprint,
            });
        }
        Ok(members)
    }
}
