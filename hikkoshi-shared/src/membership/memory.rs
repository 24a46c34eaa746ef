/// In-memory membership store
///
/// Used by tests and local demos. All state sits behind one async mutex that
/// is held for the whole of each call, which gives the same all-or-nothing
/// behaviour as a transaction. Tasks are not tracked here, so
/// `detach_member` only unbinds.
///
/// `inject_bind_failure` makes the next redemption fail after its checks pass
/// and before anything is written, which is how tests observe that a failed
/// bind leaves the invite unused.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{BindOutcome, HouseholdOutcome, MembershipStore, SignupOutcome};
use super::StoreError;
use crate::models::{
    account::{Account, NewAccount},
    household::{Household, NewHousehold},
    invite::{Invite, NewInvite},
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    households: HashMap<Uuid, Household>,
    invites: HashMap<Uuid, Invite>,
}

impl State {
    fn email_taken(&self, email: &str) -> bool {
        self.accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(email))
    }

    fn invite_redeemable(&self, invite_id: Uuid, now: DateTime<Utc>) -> bool {
        self.invites
            .get(&invite_id)
            .is_some_and(|invite| !invite.used && now < invite.expires_at)
    }

    fn mark_used(&mut self, invite_id: Uuid, used_by: Uuid, now: DateTime<Utc>) {
        if let Some(invite) = self.invites.get_mut(&invite_id) {
            invite.used = true;
            invite.used_by = Some(used_by);
            invite.used_at = Some(now);
        }
    }

    fn new_account(data: &NewAccount, household_id: Option<Uuid>) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            email: data.email.clone(),
            password_hash: data.password_hash.clone(),
            display_name: data.display_name.clone(),
            household_id,
            pending_email: None,
            email_change_token_hash: None,
            email_change_requested_at: None,
            password_reset_token_hash: None,
            password_reset_requested_at: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    state: Mutex<State>,
    fail_next_bind: AtomicBool,
    invite_lookups: AtomicUsize,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        MemoryMembershipStore::default()
    }

    /// Makes the next `redeem_for_account` or `redeem_for_signup` fail with
    /// `StoreError::Unavailable` without writing anything
    pub fn inject_bind_failure(&self) {
        self.fail_next_bind.store(true, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> Result<(), StoreError> {
        if self.fail_next_bind.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected bind failure".to_string()));
        }
        Ok(())
    }

    /// How many times an invite has been looked up by code hash
    pub fn invite_lookups(&self) -> usize {
        self.invite_lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of an invite by row ID (test assertions)
    pub async fn invite(&self, id: Uuid) -> Option<Invite> {
        self.state.lock().await.invites.get(&id).cloned()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_account(&self, data: &NewAccount) -> Result<Option<Account>, StoreError> {
        let mut state = self.state.lock().await;
        if state.email_taken(&data.email) {
            return Ok(None);
        }

        let account = State::new_account(data, None);
        state.accounts.insert(account.id, account.clone());
        Ok(Some(account))
    }

    async fn record_login(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(account) = self.state.lock().await.accounts.get_mut(&id) {
            account.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_display_name(
        &self,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<Account>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.accounts.get_mut(&id).map(|account| {
            account.display_name = display_name.to_string();
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(false);
        };

        account.password_hash = password_hash.to_string();
        account.password_reset_token_hash = None;
        account.password_reset_requested_at = None;
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn request_password_reset(
        &self,
        id: Uuid,
        token_hash: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(false);
        };

        account.password_reset_token_hash = Some(token_hash.to_string());
        account.password_reset_requested_at = Some(requested_at);
        Ok(true)
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<Account>, StoreError> {
        let mut state = self.state.lock().await;
        let account = state.accounts.values_mut().find(|account| {
            account.password_reset_token_hash.as_deref() == Some(token_hash)
                && account
                    .password_reset_requested_at
                    .is_some_and(|requested_at| requested_at > not_before)
        });

        Ok(account.map(|account| {
            account.password_hash = password_hash.to_string();
            account.password_reset_token_hash = None;
            account.password_reset_requested_at = None;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn find_household(&self, id: Uuid) -> Result<Option<Household>, StoreError> {
        Ok(self.state.lock().await.households.get(&id).cloned())
    }

    async fn create_household(
        &self,
        owner_id: Uuid,
        data: &NewHousehold,
    ) -> Result<HouseholdOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let Some(owner) = state.accounts.get_mut(&owner_id) else {
            return Ok(HouseholdOutcome::OwnerUnavailable);
        };
        if owner.household_id.is_some() {
            return Ok(HouseholdOutcome::OwnerUnavailable);
        }

        let now = Utc::now();
        let household = Household {
            id: Uuid::new_v4(),
            owner_id,
            name: data.name.clone(),
            move_date: data.move_date,
            last_updated_by: Some(owner_id),
            created_at: now,
            updated_at: now,
        };
        owner.household_id = Some(household.id);
        owner.updated_at = now;

        state.households.insert(household.id, household.clone());
        Ok(HouseholdOutcome::Created(household))
    }

    async fn update_move_date(
        &self,
        household_id: Uuid,
        move_date: Option<NaiveDate>,
        updated_by: Uuid,
    ) -> Result<Option<Household>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.households.get_mut(&household_id).map(|household| {
            household.move_date = move_date;
            household.last_updated_by = Some(updated_by);
            household.updated_at = Utc::now();
            household.clone()
        }))
    }

    async fn list_members(&self, household_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().await;
        let mut members: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.is_member_of(household_id))
            .cloned()
            .collect();
        members.sort_by_key(|a| a.created_at);
        Ok(members)
    }

    async fn insert_invite(&self, data: &NewInvite) -> Result<Invite, StoreError> {
        let mut state = self.state.lock().await;
        if state.invites.values().any(|i| i.code_hash == data.code_hash) {
            return Err(StoreError::Unavailable("duplicate invite code".to_string()));
        }

        let invite = Invite {
            id: Uuid::new_v4(),
            code_hash: data.code_hash.clone(),
            household_id: data.household_id,
            issued_by: data.issued_by,
            created_at: data.created_at,
            expires_at: data.expires_at,
            used: false,
            used_by: None,
            used_at: None,
        };
        state.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn find_invite_by_code_hash(
        &self,
        code_hash: &str,
    ) -> Result<Option<Invite>, StoreError> {
        self.invite_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(state
            .invites
            .values()
            .find(|i| i.code_hash == code_hash)
            .cloned())
    }

    async fn list_invites(&self, household_id: Uuid) -> Result<Vec<Invite>, StoreError> {
        let state = self.state.lock().await;
        let mut invites: Vec<Invite> = state
            .invites
            .values()
            .filter(|i| i.household_id == household_id)
            .cloned()
            .collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn consume_invite(
        &self,
        invite_id: Uuid,
        used_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.invite_redeemable(invite_id, now) {
            return Ok(false);
        }

        state.mark_used(invite_id, used_by, now);
        Ok(true)
    }

    async fn redeem_for_account(
        &self,
        invite_id: Uuid,
        account_id: Uuid,
        household_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError> {
        let mut state = self.state.lock().await;

        if !state.invite_redeemable(invite_id, now) {
            return Ok(BindOutcome::InviteUnavailable);
        }
        let account_is_free = state
            .accounts
            .get(&account_id)
            .is_some_and(|a| a.household_id.is_none());
        if !account_is_free {
            return Ok(BindOutcome::AccountUnavailable);
        }

        self.take_injected_failure()?;

        state.mark_used(invite_id, account_id, now);
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.household_id = Some(household_id);
            account.updated_at = now;
        }
        Ok(BindOutcome::Bound)
    }

    async fn redeem_for_signup(
        &self,
        invite_id: Uuid,
        household_id: Uuid,
        data: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<SignupOutcome, StoreError> {
        let mut state = self.state.lock().await;

        if state.email_taken(&data.email) {
            return Ok(SignupOutcome::EmailTaken);
        }
        if !state.invite_redeemable(invite_id, now) {
            return Ok(SignupOutcome::InviteUnavailable);
        }

        self.take_injected_failure()?;

        let account = State::new_account(data, Some(household_id));
        state.mark_used(invite_id, account.id, now);
        state.accounts.insert(account.id, account.clone());
        Ok(SignupOutcome::Created(account))
    }

    async fn detach_member(
        &self,
        household_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&account_id) {
            Some(account) if account.is_member_of(household_id) => {
                account.household_id = None;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "$argon2id$hash".to_string(),
            display_name: "Test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate_email_case_insensitively() {
        let store = MemoryMembershipStore::new();

        assert!(store
            .create_account(&new_account("hanako@example.com"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .create_account(&new_account("HANAKO@example.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_consume_invite_is_single_shot() {
        let store = MemoryMembershipStore::new();
        let now = Utc::now();
        let invite = store
            .insert_invite(&NewInvite {
                code_hash: "a".repeat(64),
                household_id: Uuid::new_v4(),
                issued_by: Uuid::new_v4(),
                created_at: now,
                expires_at: now + Duration::hours(24),
            })
            .await
            .unwrap();

        let user = Uuid::new_v4();
        assert!(store.consume_invite(invite.id, user, now).await.unwrap());
        assert!(!store.consume_invite(invite.id, Uuid::new_v4(), now).await.unwrap());

        let stored = store.invite(invite.id).await.unwrap();
        assert!(stored.used);
        assert_eq!(stored.used_by, Some(user));
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let store = MemoryMembershipStore::new();
        let owner = store
            .create_account(&new_account("owner@example.com"))
            .await
            .unwrap()
            .unwrap();
        let HouseholdOutcome::Created(household) = store
            .create_household(
                owner.id,
                &NewHousehold {
                    name: "Home".to_string(),
                    move_date: None,
                },
            )
            .await
            .unwrap()
        else {
            panic!("household not created");
        };

        let now = Utc::now();
        let invite = store
            .insert_invite(&NewInvite {
                code_hash: "b".repeat(64),
                household_id: household.id,
                issued_by: owner.id,
                created_at: now,
                expires_at: now + Duration::hours(24),
            })
            .await
            .unwrap();

        store.inject_bind_failure();
        let result = store
            .redeem_for_signup(invite.id, household.id, &new_account("guest@example.com"), now)
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(!store.invite(invite.id).await.unwrap().used);
        assert!(store
            .find_account_by_email("guest@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
