/// Persistence contract for membership data
///
/// Every method that changes more than one row is a single atomic unit: the
/// PostgreSQL implementation wraps it in a transaction, the in-memory one
/// holds its lock for the whole call. Callers never compose two writes
/// themselves.
///
/// Conditional writes report their outcome in the return value rather than as
/// an error. A `StoreError` always means "nothing was applied, something is
/// broken".

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::models::{
    account::{Account, NewAccount},
    household::{Household, NewHousehold},
    invite::{Invite, NewInvite},
};

/// Result of redeeming an invite for an existing account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Invite consumed and account bound
    Bound,

    /// The invite was used or expired by the time of the write
    InviteUnavailable,

    /// The account is missing or already bound
    AccountUnavailable,
}

/// Result of creating an account through an invite
#[derive(Debug, Clone, PartialEq)]
pub enum SignupOutcome {
    /// Account created, bound, and the invite consumed
    Created(Account),

    /// The invite was used or expired by the time of the write
    InviteUnavailable,

    /// The email address is registered to another account
    EmailTaken,
}

/// Result of creating a household
#[derive(Debug, Clone, PartialEq)]
pub enum HouseholdOutcome {
    /// Household created with the requester as owner and member
    Created(Household),

    /// The requester is missing or already bound
    OwnerUnavailable,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Creates an unbound account; `None` if the email is taken
    async fn create_account(&self, data: &NewAccount) -> Result<Option<Account>, StoreError>;

    /// Stamps the account's last login time
    async fn record_login(&self, id: Uuid) -> Result<(), StoreError>;

    /// Renames the account; `None` if it does not exist
    async fn update_display_name(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Replaces the password hash and drops any outstanding reset token
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;

    /// Stores a reset token digest for the account, replacing any earlier one
    async fn request_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Sets `password_hash` on the account holding a reset token matching
    /// `token_hash` requested after `not_before`, and clears the token
    async fn reset_password(
        &self,
        token_hash: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_household(&self, id: Uuid) -> Result<Option<Household>, StoreError>;

    /// Creates a household owned by `owner_id` and binds the owner to it
    async fn create_household(
        &self,
        owner_id: Uuid,
        data: &NewHousehold,
    ) -> Result<HouseholdOutcome, StoreError>;

    async fn update_move_date(
        &self,
        household_id: Uuid,
        move_date: Option<NaiveDate>,
        updated_by: Uuid,
    ) -> Result<Option<Household>, StoreError>;

    /// Accounts bound to `household_id`, oldest first
    async fn list_members(&self, household_id: Uuid) -> Result<Vec<Account>, StoreError>;

    async fn insert_invite(&self, data: &NewInvite) -> Result<Invite, StoreError>;

    async fn find_invite_by_code_hash(&self, code_hash: &str)
        -> Result<Option<Invite>, StoreError>;

    /// A household's invites, newest first
    async fn list_invites(&self, household_id: Uuid) -> Result<Vec<Invite>, StoreError>;

    /// Marks the invite used iff it is unused and unexpired at `now`
    ///
    /// Returns whether this call performed the transition. A second call for
    /// the same invite returns `false` and changes nothing.
    async fn consume_invite(
        &self,
        invite_id: Uuid,
        used_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Consumes the invite and binds the unbound account to `household_id`
    ///
    /// Both writes happen or neither does.
    async fn redeem_for_account(
        &self,
        invite_id: Uuid,
        account_id: Uuid,
        household_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError>;

    /// Creates an account bound to `household_id` and consumes the invite
    ///
    /// Both writes happen or neither does.
    async fn redeem_for_signup(
        &self,
        invite_id: Uuid,
        household_id: Uuid,
        data: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome, StoreError>;

    /// Detaches a member: unassigns their tasks in the household, then unbinds
    ///
    /// Returns `false` (and changes nothing) if the account is not a member.
    /// Ownership rules are the caller's concern.
    async fn detach_member(&self, household_id: Uuid, account_id: Uuid)
        -> Result<bool, StoreError>;
}
