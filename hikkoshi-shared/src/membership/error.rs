use thiserror::Error;

use super::policy::PolicyError;

/// Persistence failure inside a `MembershipStore`
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the write; nothing was applied
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Membership operation errors
///
/// Every variant except `Store` is an expected outcome of user input and is
/// reported back to the caller as-is.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// The code is not a syntactically valid invite code
    #[error("Invite code is malformed")]
    Malformed,

    /// No invite matches the code
    #[error("Invite not found")]
    NotFound,

    /// The invite's expiry has passed
    #[error("Invite has expired")]
    Expired,

    /// The invite was already redeemed
    #[error("Invite has already been used")]
    AlreadyUsed,

    /// The requester may not perform this operation
    #[error("Permission denied")]
    PermissionDenied,

    /// The account already belongs to a (different) household
    #[error("Account already belongs to a household")]
    AlreadyInHousehold,

    /// The account does not belong to the household
    #[error("Account does not belong to a household")]
    NotInHousehold,

    /// Owners cannot be detached from their own household
    #[error("The household owner cannot be removed")]
    CannotRemoveOwner,

    /// The email address is registered to another account
    #[error("Email address is already registered")]
    EmailTaken,

    /// The configured invite lifetime cannot produce an expiry
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MembershipError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MembershipError::Malformed => "invite_malformed",
            MembershipError::NotFound => "invite_not_found",
            MembershipError::Expired => "invite_expired",
            MembershipError::AlreadyUsed => "invite_already_used",
            MembershipError::PermissionDenied => "permission_denied",
            MembershipError::AlreadyInHousehold => "already_in_household",
            MembershipError::NotInHousehold => "not_in_household",
            MembershipError::CannotRemoveOwner => "cannot_remove_owner",
            MembershipError::EmailTaken => "email_taken",
            MembershipError::Policy(_) => "invite_policy_error",
            MembershipError::Store(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for MembershipError {
    fn from(err: sqlx::Error) -> Self {
        MembershipError::Store(StoreError::Database(err))
    }
}
