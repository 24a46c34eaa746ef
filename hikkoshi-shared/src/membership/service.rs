/// Membership operations
///
/// These are the entry points the HTTP layer calls. Each takes the store as
/// `&dyn MembershipStore` and, when there is an authenticated caller, a
/// `RequestContext`.
///
/// # Redemption order
///
/// ```text
/// parse code ──> Malformed
/// lookup     ──> NotFound
/// caller already in this household ──> AlreadyMember (no-op success)
/// validate   ──> Expired | AlreadyUsed
/// caller bound elsewhere ──> AlreadyInHousehold
/// consume + bind (atomic)
/// ```
///
/// Owner-only operations answer `PermissionDenied` both for non-owners and for
/// households that do not exist.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::code::InviteCode;
use super::context::RequestContext;
use super::error::MembershipError;
use super::policy::{validate, InvitePolicy, InviteStatus};
use super::store::{BindOutcome, HouseholdOutcome, MembershipStore, SignupOutcome};
use crate::models::{
    account::{Account, NewAccount},
    household::{Household, NewHousehold},
    invite::{Invite, NewInvite},
};

/// A freshly issued invite; `code` is shown to the owner once and not stored
#[derive(Debug, Clone)]
pub struct IssuedInvite {
    pub invite: Invite,
    pub code: InviteCode,
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    /// The account joined the household and the invite was consumed
    Joined(Household),

    /// The account was already a member; nothing changed
    AlreadyMember(Household),
}

impl RedeemOutcome {
    pub fn household(&self) -> &Household {
        match self {
            RedeemOutcome::Joined(household) | RedeemOutcome::AlreadyMember(household) => household,
        }
    }
}

/// What the viewer of an invite link would do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteAction {
    /// Logged in and unbound: redeem to join
    Join,

    /// Logged in and already a member of this household
    AlreadyMember,

    /// Not logged in: sign up with the invite
    Signup,
}

/// Read-only view of a redeemable invite
#[derive(Debug, Clone, Serialize)]
pub struct InvitePreview {
    pub household_id: Uuid,
    pub household_name: String,
    pub move_date: Option<NaiveDate>,
    pub expires_at: DateTime<Utc>,
    pub action: InviteAction,
}

async fn require_account(
    store: &dyn MembershipStore,
    account_id: Uuid,
) -> Result<Account, MembershipError> {
    store
        .find_account(account_id)
        .await?
        .ok_or(MembershipError::PermissionDenied)
}

async fn require_owned_household(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    household_id: Uuid,
) -> Result<Household, MembershipError> {
    store
        .find_household(household_id)
        .await?
        .filter(|household| household.is_owner(ctx.account_id))
        .ok_or(MembershipError::PermissionDenied)
}

async fn invite_household(
    store: &dyn MembershipStore,
    invite: &Invite,
) -> Result<Household, MembershipError> {
    store
        .find_household(invite.household_id)
        .await?
        .ok_or(MembershipError::NotFound)
}

/// Explains why a guarded consume matched nothing
///
/// Another request got there first (`AlreadyUsed`), or the clock crossed the
/// expiry between validation and the write (`Expired`).
async fn lost_race(
    store: &dyn MembershipStore,
    invite: &Invite,
    now: DateTime<Utc>,
) -> MembershipError {
    match store.find_invite_by_code_hash(&invite.code_hash).await {
        Ok(Some(current)) if validate(&current, now) == InviteStatus::Expired => {
            MembershipError::Expired
        }
        Ok(Some(_)) => MembershipError::AlreadyUsed,
        Ok(None) => MembershipError::NotFound,
        Err(e) => e.into(),
    }
}

/// Creates an unbound account
pub async fn register_account(
    store: &dyn MembershipStore,
    data: &NewAccount,
) -> Result<Account, MembershipError> {
    let account = store
        .create_account(data)
        .await?
        .ok_or(MembershipError::EmailTaken)?;

    info!(account_id = %account.id, "Account registered");
    Ok(account)
}

/// Creates a household owned by the caller and binds the caller to it
///
/// # Errors
///
/// - `AlreadyInHousehold` if the caller already belongs to a household
/// - `PermissionDenied` if the caller's account does not exist
pub async fn create_household(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    data: &NewHousehold,
) -> Result<Household, MembershipError> {
    let account = require_account(store, ctx.account_id).await?;
    if account.household_id.is_some() {
        return Err(MembershipError::AlreadyInHousehold);
    }

    match store.create_household(ctx.account_id, data).await? {
        HouseholdOutcome::Created(household) => {
            info!(
                household_id = %household.id,
                owner_id = %ctx.account_id,
                "Household created"
            );
            Ok(household)
        }
        HouseholdOutcome::OwnerUnavailable => Err(MembershipError::AlreadyInHousehold),
    }
}

/// Issues a new invite for `household_id`; owner only
pub async fn issue_invite(
    store: &dyn MembershipStore,
    policy: &InvitePolicy,
    ctx: &RequestContext,
    household_id: Uuid,
) -> Result<IssuedInvite, MembershipError> {
    let household = match require_owned_household(store, ctx, household_id).await {
        Ok(household) => household,
        Err(e) => {
            warn!(
                household_id = %household_id,
                account_id = %ctx.account_id,
                "Invite issuance denied"
            );
            return Err(e);
        }
    };

    let expires_at = policy.expires_at(ctx.now)?;
    let code = InviteCode::generate();
    let invite = store
        .insert_invite(&NewInvite {
            code_hash: code.hash(),
            household_id: household.id,
            issued_by: ctx.account_id,
            created_at: ctx.now,
            expires_at,
        })
        .await?;

    info!(
        invite_id = %invite.id,
        household_id = %household.id,
        expires_at = %invite.expires_at,
        "Invite issued"
    );

    Ok(IssuedInvite { invite, code })
}

/// Resolves a raw code to its stored invite
///
/// A malformed code is rejected before the store is consulted.
pub async fn lookup_invite(
    store: &dyn MembershipStore,
    raw_code: &str,
) -> Result<Invite, MembershipError> {
    let code = InviteCode::parse(raw_code)?;

    store
        .find_invite_by_code_hash(&code.hash())
        .await?
        .ok_or(MembershipError::NotFound)
}

/// Previews an invite without consuming it
///
/// Applies the full redemption order, so the answer matches what a redemption
/// at `now` would do. `viewer` is the logged-in account, if any.
pub async fn inspect_invite(
    store: &dyn MembershipStore,
    raw_code: &str,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<InvitePreview, MembershipError> {
    let invite = lookup_invite(store, raw_code).await?;
    let viewer = match viewer {
        Some(account_id) => Some(require_account(store, account_id).await?),
        None => None,
    };

    let action = match &viewer {
        Some(account) if account.is_member_of(invite.household_id) => InviteAction::AlreadyMember,
        Some(account) => {
            validate(&invite, now).into_result()?;
            if account.household_id.is_some() {
                return Err(MembershipError::AlreadyInHousehold);
            }
            InviteAction::Join
        }
        None => {
            validate(&invite, now).into_result()?;
            InviteAction::Signup
        }
    };

    let household = invite_household(store, &invite).await?;

    Ok(InvitePreview {
        household_id: household.id,
        household_name: household.name,
        move_date: household.move_date,
        expires_at: invite.expires_at,
        action,
    })
}

/// Redeems an invite for the logged-in caller
pub async fn redeem_invite(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    raw_code: &str,
) -> Result<RedeemOutcome, MembershipError> {
    let invite = lookup_invite(store, raw_code).await?;
    let account = require_account(store, ctx.account_id).await?;

    if account.is_member_of(invite.household_id) {
        debug!(
            invite_id = %invite.id,
            account_id = %account.id,
            "Redeemer already a member, nothing to do"
        );
        let household = invite_household(store, &invite).await?;
        return Ok(RedeemOutcome::AlreadyMember(household));
    }

    validate(&invite, ctx.now).into_result()?;

    if account.household_id.is_some() {
        return Err(MembershipError::AlreadyInHousehold);
    }

    match store
        .redeem_for_account(invite.id, account.id, invite.household_id, ctx.now)
        .await?
    {
        BindOutcome::Bound => {
            info!(
                invite_id = %invite.id,
                account_id = %account.id,
                household_id = %invite.household_id,
                "Invite redeemed"
            );
            let household = invite_household(store, &invite).await?;
            Ok(RedeemOutcome::Joined(household))
        }
        BindOutcome::InviteUnavailable => Err(lost_race(store, &invite, ctx.now).await),
        BindOutcome::AccountUnavailable => {
            // Bound by a concurrent request; report it the same way a later call would
            let current = require_account(store, account.id).await?;
            if current.is_member_of(invite.household_id) {
                let household = invite_household(store, &invite).await?;
                Ok(RedeemOutcome::AlreadyMember(household))
            } else {
                Err(MembershipError::AlreadyInHousehold)
            }
        }
    }
}

/// Creates an account already bound to the invite's household
pub async fn signup_with_invite(
    store: &dyn MembershipStore,
    raw_code: &str,
    data: &NewAccount,
    now: DateTime<Utc>,
) -> Result<(Account, Household), MembershipError> {
    let invite = lookup_invite(store, raw_code).await?;
    validate(&invite, now).into_result()?;

    match store
        .redeem_for_signup(invite.id, invite.household_id, data, now)
        .await?
    {
        SignupOutcome::Created(account) => {
            info!(
                invite_id = %invite.id,
                account_id = %account.id,
                household_id = %invite.household_id,
                "Account created through invite"
            );
            let household = invite_household(store, &invite).await?;
            Ok((account, household))
        }
        SignupOutcome::EmailTaken => Err(MembershipError::EmailTaken),
        SignupOutcome::InviteUnavailable => Err(lost_race(store, &invite, now).await),
    }
}

/// Lists a household's invites; owner only
pub async fn list_invites(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    household_id: Uuid,
) -> Result<Vec<Invite>, MembershipError> {
    let household = require_owned_household(store, ctx, household_id).await?;
    Ok(store.list_invites(household.id).await?)
}

/// Detaches `member_id` from the household; owner only
pub async fn remove_member(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    household_id: Uuid,
    member_id: Uuid,
) -> Result<(), MembershipError> {
    let household = require_owned_household(store, ctx, household_id).await?;
    if household.is_owner(member_id) {
        return Err(MembershipError::CannotRemoveOwner);
    }

    if !store.detach_member(household.id, member_id).await? {
        return Err(MembershipError::NotInHousehold);
    }

    info!(
        household_id = %household.id,
        member_id = %member_id,
        removed_by = %ctx.account_id,
        "Member removed"
    );
    Ok(())
}

/// Detaches the caller from their household; owners cannot leave
pub async fn leave_household(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
) -> Result<Household, MembershipError> {
    let household = current_household(store, ctx)
        .await?
        .ok_or(MembershipError::NotInHousehold)?;

    if household.is_owner(ctx.account_id) {
        return Err(MembershipError::CannotRemoveOwner);
    }

    if !store.detach_member(household.id, ctx.account_id).await? {
        return Err(MembershipError::NotInHousehold);
    }

    info!(household_id = %household.id, account_id = %ctx.account_id, "Member left household");
    Ok(household)
}

/// The caller's household, if bound
pub async fn current_household(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
) -> Result<Option<Household>, MembershipError> {
    let account = require_account(store, ctx.account_id).await?;
    match account.household_id {
        Some(household_id) => Ok(store.find_household(household_id).await?),
        None => Ok(None),
    }
}

/// The caller's account and household ID; `NotInHousehold` if unbound
///
/// Gatekeeper for household-scoped resources (tasks, messages).
pub async fn require_membership(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
) -> Result<(Account, Uuid), MembershipError> {
    let account = require_account(store, ctx.account_id).await?;
    let household_id = account
        .household_id
        .ok_or(MembershipError::NotInHousehold)?;
    Ok((account, household_id))
}

/// Lists the members of `household_id`; members only
pub async fn list_members(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    household_id: Uuid,
) -> Result<Vec<Account>, MembershipError> {
    let account = require_account(store, ctx.account_id).await?;
    if !account.is_member_of(household_id) {
        return Err(MembershipError::PermissionDenied);
    }

    Ok(store.list_members(household_id).await?)
}

/// Sets the household's move date; any member may do this
pub async fn update_move_date(
    store: &dyn MembershipStore,
    ctx: &RequestContext,
    household_id: Uuid,
    move_date: Option<NaiveDate>,
) -> Result<Household, MembershipError> {
    let account = require_account(store, ctx.account_id).await?;
    if !account.is_member_of(household_id) {
        return Err(MembershipError::PermissionDenied);
    }

    let household = store
        .update_move_date(household_id, move_date, ctx.account_id)
        .await?
        .ok_or(MembershipError::PermissionDenied)?;

    info!(
        household_id = %household_id,
        move_date = ?move_date,
        updated_by = %ctx.account_id,
        "Move date updated"
    );
    Ok(household)
}
