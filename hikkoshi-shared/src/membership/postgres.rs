/// PostgreSQL-backed membership store
///
/// Multi-row operations run in one transaction. Redemption relies on two
/// guarded updates (`used = FALSE` on the invite, `household_id IS NULL` on
/// the account); if either matches zero rows the transaction is rolled back,
/// so two racing redemptions of one invite cannot both commit.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::store::{BindOutcome, HouseholdOutcome, MembershipStore, SignupOutcome};
use super::StoreError;
use crate::models::{
    account::{Account, NewAccount},
    household::{Household, NewHousehold},
    invite::{Invite, NewInvite},
    task::HouseholdTask,
};

/// Unique index on `lower(accounts.email)`
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "accounts_email_lower_key";

#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        PgMembershipStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Whether `err` is a duplicate-email violation
pub fn is_email_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(Account::find_by_id(&self.pool, id).await?)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(Account::find_by_email(&self.pool, email).await?)
    }

    async fn create_account(&self, data: &NewAccount) -> Result<Option<Account>, StoreError> {
        match Account::create(&self.pool, data, None).await {
            Ok(account) => Ok(Some(account)),
            Err(e) if is_email_conflict(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_login(&self, id: Uuid) -> Result<(), StoreError> {
        Account::update_last_login(&self.pool, id).await?;
        Ok(())
    }

    async fn update_display_name(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(Account::update_display_name(&self.pool, id, display_name).await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        Ok(Account::update_password(&self.pool, id, password_hash).await?)
    }

    async fn request_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(Account::request_password_reset(&self.pool, id, token_hash, requested_at).await?)
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError> {
        Ok(Account::reset_password(&self.pool, token_hash, not_before, password_hash).await?)
    }

    async fn find_household(&self, id: Uuid) -> Result<Option<Household>, StoreError> {
        Ok(Household::find_by_id(&self.pool, id).await?)
    }

    async fn create_household(
        &self,
        owner_id: Uuid,
        data: &NewHousehold,
    ) -> Result<HouseholdOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner_is_free = Account::find_by_id(&mut *tx, owner_id)
            .await?
            .is_some_and(|account| account.household_id.is_none());
        if !owner_is_free {
            tx.rollback().await?;
            return Ok(HouseholdOutcome::OwnerUnavailable);
        }

        let household = Household::insert(&mut *tx, owner_id, data).await?;

        if !Account::bind_household(&mut *tx, owner_id, household.id).await? {
            debug!(owner_id = %owner_id, "Owner was bound concurrently, rolling back");
            tx.rollback().await?;
            return Ok(HouseholdOutcome::OwnerUnavailable);
        }

        tx.commit().await?;
        Ok(HouseholdOutcome::Created(household))
    }

    async fn update_move_date(
        &self,
        household_id: Uuid,
        move_date: Option<NaiveDate>,
        updated_by: Uuid,
    ) -> Result<Option<Household>, StoreError> {
        Ok(Household::update_move_date(&self.pool, household_id, move_date, updated_by).await?)
    }

    async fn list_members(&self, household_id: Uuid) -> Result<Vec<Account>, StoreError> {
        Ok(Account::list_by_household(&self.pool, household_id).await?)
    }

    async fn insert_invite(&self, data: &NewInvite) -> Result<Invite, StoreError> {
        Ok(Invite::insert(&self.pool, data).await?)
    }

    async fn find_invite_by_code_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<Invite>, StoreError> {
        Ok(Invite::find_by_code_hash(&self.pool, code_hash).await?)
    }

    async fn list_invites(&self, household_id: Uuid) -> Result<Vec<Invite>, StoreError> {
        Ok(Invite::list_by_household(&self.pool, household_id).await?)
    }

    async fn consume_invite(
        &self,
        invite_id: Uuid,
        used_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(Invite::consume(&self.pool, invite_id, used_by, now).await?)
    }

    async fn redeem_for_account(
        &self,
        invite_id: Uuid,
        account_id: Uuid,
        household_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        if !Invite::consume(&mut *tx, invite_id, account_id, now).await? {
            tx.rollback().await?;
            return Ok(BindOutcome::InviteUnavailable);
        }

        if !Account::bind_household(&mut *tx, account_id, household_id).await? {
            tx.rollback().await?;
            return Ok(BindOutcome::AccountUnavailable);
        }

        tx.commit().await?;
        Ok(BindOutcome::Bound)
    }

    async fn redeem_for_signup(
        &self,
        invite_id: Uuid,
        household_id: Uuid,
        data: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let account = match Account::create(&mut *tx, data, Some(household_id)).await {
            Ok(account) => account,
            Err(e) if is_email_conflict(&e) => {
                tx.rollback().await?;
                return Ok(SignupOutcome::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        };

        if !Invite::consume(&mut *tx, invite_id, account.id, now).await? {
            tx.rollback().await?;
            return Ok(SignupOutcome::InviteUnavailable);
        }

        tx.commit().await?;
        Ok(SignupOutcome::Created(account))
    }

    async fn detach_member(
        &self,
        household_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let unassigned = HouseholdTask::unassign_member(&mut *tx, household_id, account_id).await?;

        if !Account::unbind_household(&mut *tx, account_id, household_id).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        debug!(
            household_id = %household_id,
            account_id = %account_id,
            unassigned_tasks = unassigned,
            "Member detached"
        );
        Ok(true)
    }
}
