/// Invite expiry and validation
///
/// Expiry is absolute: fixed at issuance as `created_at + ttl` and never
/// extended. An invite is redeemable iff `now < expires_at` and it is unused.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use super::MembershipError;
use crate::models::invite::Invite;

/// Default invite lifetime in hours
pub const DEFAULT_INVITE_TTL_HOURS: i64 = 24;

/// Longest accepted invite lifetime in hours (one year)
pub const MAX_INVITE_TTL_HOURS: i64 = 24 * 365;

/// An invite lifetime or expiry that cannot be represented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invite TTL must be between 1 and {max} hours, got {0}", max = MAX_INVITE_TTL_HOURS)]
    TtlOutOfRange(i64),

    #[error("invite expiry is out of the supported date range")]
    ExpiryOutOfRange,
}

/// How long issued invites stay redeemable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitePolicy {
    ttl: Duration,
}

impl InvitePolicy {
    /// Creates a policy lasting `hours`, which must be in
    /// `1..=MAX_INVITE_TTL_HOURS`
    pub fn from_hours(hours: i64) -> Result<Self, PolicyError> {
        if !(1..=MAX_INVITE_TTL_HOURS).contains(&hours) {
            return Err(PolicyError::TtlOutOfRange(hours));
        }
        Ok(InvitePolicy {
            ttl: Duration::hours(hours),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Expiry for an invite issued at `issued_at`
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>, PolicyError> {
        issued_at
            .checked_add_signed(self.ttl)
            .ok_or(PolicyError::ExpiryOutOfRange)
    }
}

impl Default for InvitePolicy {
    fn default() -> Self {
        InvitePolicy {
            ttl: Duration::hours(DEFAULT_INVITE_TTL_HOURS),
        }
    }
}

/// Result of checking an invite at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Valid,
    Expired,
    AlreadyUsed,
}

impl InviteStatus {
    /// Maps a non-valid status to its error
    pub fn into_result(self) -> Result<(), MembershipError> {
        match self {
            InviteStatus::Valid => Ok(()),
            InviteStatus::Expired => Err(MembershipError::Expired),
            InviteStatus::AlreadyUsed => Err(MembershipError::AlreadyUsed),
        }
    }
}

/// Checks whether `invite` is redeemable at `now`
///
/// Expiry is checked first: a used invite past its expiry reports `Expired`.
pub fn validate(invite: &Invite, now: DateTime<Utc>) -> InviteStatus {
    if now >= invite.expires_at {
        InviteStatus::Expired
    } else if invite.used {
        InviteStatus::AlreadyUsed
    } else {
        InviteStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invite(issued_at: DateTime<Utc>, used: bool) -> Invite {
        Invite {
            id: Uuid::new_v4(),
            code_hash: "0".repeat(64),
            household_id: Uuid::new_v4(),
            issued_by: Uuid::new_v4(),
            created_at: issued_at,
            expires_at: InvitePolicy::default().expires_at(issued_at).unwrap(),
            used,
            used_by: None,
            used_at: None,
        }
    }

    #[test]
    fn test_default_ttl_is_24_hours() {
        let issued_at = Utc::now();
        assert_eq!(
            InvitePolicy::default().expires_at(issued_at).unwrap(),
            issued_at + Duration::hours(24)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let issued_at = Utc::now();
        let fresh = invite(issued_at, false);

        assert_eq!(validate(&fresh, issued_at), InviteStatus::Valid);
        assert_eq!(
            validate(&fresh, issued_at + Duration::hours(24) - Duration::milliseconds(1)),
            InviteStatus::Valid
        );
        assert_eq!(
            validate(&fresh, issued_at + Duration::hours(24)),
            InviteStatus::Expired
        );
        assert_eq!(
            validate(&fresh, issued_at + Duration::hours(24) + Duration::minutes(1)),
            InviteStatus::Expired
        );
    }

    #[test]
    fn test_expired_wins_over_used() {
        let issued_at = Utc::now();
        let used = invite(issued_at, true);

        assert_eq!(validate(&used, issued_at), InviteStatus::AlreadyUsed);
        assert_eq!(
            validate(&used, issued_at + Duration::days(2)),
            InviteStatus::Expired
        );
    }

    #[test]
    fn test_into_result() {
        assert!(InviteStatus::Valid.into_result().is_ok());
        assert!(matches!(
            InviteStatus::Expired.into_result(),
            Err(MembershipError::Expired)
        ));
        assert!(matches!(
            InviteStatus::AlreadyUsed.into_result(),
            Err(MembershipError::AlreadyUsed)
        ));
    }

    #[test]
    fn test_ttl_range() {
        assert_eq!(InvitePolicy::from_hours(0), Err(PolicyError::TtlOutOfRange(0)));
        assert_eq!(InvitePolicy::from_hours(-5), Err(PolicyError::TtlOutOfRange(-5)));
        assert_eq!(
            InvitePolicy::from_hours(10_000_000_000),
            Err(PolicyError::TtlOutOfRange(10_000_000_000))
        );
        assert_eq!(
            InvitePolicy::from_hours(MAX_INVITE_TTL_HOURS).unwrap().ttl(),
            Duration::days(365)
        );
    }

    #[test]
    fn test_expiry_past_calendar_end_is_an_error() {
        let policy = InvitePolicy::from_hours(MAX_INVITE_TTL_HOURS).unwrap();
        assert_eq!(
            policy.expires_at(DateTime::<Utc>::MAX_UTC),
            Err(PolicyError::ExpiryOutOfRange)
        );
    }
}
