use kinvault_core::{FamilyId, KinvaultResult, RecordId, Role, UserId};

use crate::rows::{
    Credentials, FamilyRow, MembershipRow, NewRecord, NewUser, RecordPatch, RecordQuery,
    RecordRow, UserRow,
};

/// The storage collaborator boundary.
///
/// Every method is one transaction: checks and writes happen together, so
/// uniqueness (one user per phone, one membership per (family, user)) is
/// enforced here and nowhere else. Blobs are stored and returned verbatim.
pub trait VaultStore: Send + Sync {
    /// Insert a user. Fails with `UserExists` for a taken phone number.
    fn insert_user(&self, user: NewUser) -> KinvaultResult<UserRow>;

    fn user(&self, id: UserId) -> KinvaultResult<Option<UserRow>>;

    fn user_by_phone(&self, phone: &str) -> KinvaultResult<Option<UserRow>>;

    /// Replace a user's verifier and sealed identity in one write.
    fn update_credentials(&self, id: UserId, credentials: Credentials) -> KinvaultResult<()>;

    /// Create a family together with the owner's membership row.
    fn create_family(
        &self,
        name: &str,
        owner: UserId,
        owner_role: Role,
        owner_wrapped_key: String,
    ) -> KinvaultResult<(FamilyRow, MembershipRow)>;

    fn family(&self, id: FamilyId) -> KinvaultResult<Option<FamilyRow>>;

    /// Insert a membership row with its wrapped key. Fails with
    /// `AlreadyMember` if the pair exists, even under concurrent callers.
    fn insert_membership(&self, row: MembershipRow) -> KinvaultResult<MembershipRow>;

    fn membership(&self, family: FamilyId, user: UserId) -> KinvaultResult<Option<MembershipRow>>;

    /// Members of a family, in join order.
    fn members(&self, family: FamilyId) -> KinvaultResult<Vec<MembershipRow>>;

    /// Every family the user belongs to, with the user's own membership row.
    fn memberships_for_user(&self, user: UserId)
        -> KinvaultResult<Vec<(FamilyRow, MembershipRow)>>;

    fn insert_record(&self, record: NewRecord) -> KinvaultResult<RecordRow>;

    fn record(&self, id: RecordId) -> KinvaultResult<Option<RecordRow>>;

    /// Apply a partial update and refresh `updated_at`. A record of another
    /// kind is reported as `RecordNotFound`.
    fn update_record(&self, id: RecordId, patch: RecordPatch) -> KinvaultResult<RecordRow>;

    fn delete_record(&self, id: RecordId) -> KinvaultResult<()>;

    fn list_records(&self, family: FamilyId, query: RecordQuery)
        -> KinvaultResult<Vec<RecordRow>>;
}
