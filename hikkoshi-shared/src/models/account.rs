/// Account model and database operations
///
/// An account is one person. It belongs to at most one household at a time;
/// `household_id` is the only membership record there is, so "one household per
/// account" holds by construction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     display_name VARCHAR(100) NOT NULL,
///     household_id UUID REFERENCES households(id),
///     pending_email VARCHAR(255),
///     email_change_token_hash CHAR(64),
///     email_change_requested_at TIMESTAMPTZ,
///     password_reset_token_hash CHAR(64),
///     password_reset_requested_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX accounts_email_lower_key ON accounts(lower(email));
/// ```
///
/// # Example
///
/// ```no_run
/// use hikkoshi_shared::models::account::{Account, NewAccount};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let account = Account::create(&pool, &NewAccount {
///     email: "hanako@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     display_name: "Hanako".to_string(),
/// }, None).await?;
///
/// let found = Account::find_by_email(&pool, "HANAKO@example.com").await?;
/// assert_eq!(found.map(|a| a.id), Some(account.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::membership::MembershipState;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, display_name, household_id, \
     pending_email, email_change_token_hash, email_change_requested_at, \
     password_reset_token_hash, password_reset_requested_at, \
     created_at, updated_at, last_login_at";

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Login email (unique ignoring case)
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Name shown to other household members
    pub display_name: String,

    /// Household this account belongs to, if any
    pub household_id: Option<Uuid>,

    /// New email awaiting confirmation
    pub pending_email: Option<String>,

    /// SHA-256 of the email change confirmation token
    #[serde(skip_serializing)]
    pub email_change_token_hash: Option<String>,

    /// When the pending email change was requested
    pub email_change_requested_at: Option<DateTime<Utc>>,

    /// SHA-256 of the outstanding password reset token
    #[serde(skip_serializing)]
    pub password_reset_token_hash: Option<String>,

    #[serde(skip_serializing)]
    pub password_reset_requested_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Login email
    pub email: String,

    /// Argon2id hash (never the plaintext password)
    pub password_hash: String,

    /// Display name
    pub display_name: String,
}

impl Account {
    /// Current membership state
    pub fn membership(&self) -> MembershipState {
        match self.household_id {
            Some(household_id) => MembershipState::Bound(household_id),
            None => MembershipState::Unbound,
        }
    }

    /// Whether this account belongs to `household_id`
    pub fn is_member_of(&self, household_id: Uuid) -> bool {
        self.household_id == Some(household_id)
    }

    /// Inserts a new account, optionally already bound to a household
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `accounts_email_lower_key` if the email is taken.
    pub async fn create<'e, E>(
        executor: E,
        data: &NewAccount,
        household_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO accounts (email, password_hash, display_name, household_id) \
             VALUES ($1, $2, $3, $4) RETURNING {ACCOUNT_COLUMNS}"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.display_name)
            .bind(household_id)
            .fetch_one(executor)
            .await
    }

    /// Finds an account by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds an account by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE lower(email) = lower($1)");

        sqlx::query_as::<_, Account>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists the members of a household, oldest first
    pub async fn list_by_household(
        pool: &PgPool,
        household_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE household_id = $1 ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(household_id)
            .fetch_all(pool)
            .await
    }

    /// Sets `household_id` only if the account is currently unbound
    ///
    /// Returns false when the account does not exist or is already bound;
    /// callers inside a transaction roll back on false.
    pub async fn bind_household<'e, E>(
        executor: E,
        id: Uuid,
        household_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET household_id = $2, updated_at = NOW()
            WHERE id = $1 AND household_id IS NULL
            "#,
        )
        .bind(id)
        .bind(household_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clears `household_id` if the account currently belongs to `household_id`
    pub async fn unbind_household<'e, E>(
        executor: E,
        id: Uuid,
        household_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET household_id = NULL, updated_at = NOW()
            WHERE id = $1 AND household_id = $2
            "#,
        )
        .bind(id)
        .bind(household_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Updates the last login timestamp
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes the display name
    pub async fn update_display_name(
        pool: &PgPool,
        id: Uuid,
        display_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE accounts SET display_name = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(display_name)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the password hash
    ///
    /// Also drops any outstanding reset token.
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                password_reset_token_hash = NULL,
                password_reset_requested_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a password reset token, replacing any earlier one
    pub async fn request_password_reset(
        pool: &PgPool,
        id: Uuid,
        token_hash: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_reset_token_hash = $2,
                password_reset_requested_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(requested_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets a new password through the reset token matching `token_hash`
    ///
    /// The token is cleared in the same statement, so it works once. Tokens
    /// issued at or before `not_before` are ignored.
    pub async fn reset_password(
        pool: &PgPool,
        token_hash: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE accounts \
             SET password_hash = $3, \
                 password_reset_token_hash = NULL, \
                 password_reset_requested_at = NULL, \
                 updated_at = NOW() \
             WHERE password_reset_token_hash = $1 \
               AND password_reset_requested_at > $2 \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(token_hash)
            .bind(not_before)
            .bind(password_hash)
            .fetch_optional(pool)
            .await
    }

    /// Records a pending email change
    ///
    /// Any earlier pending change is replaced, which invalidates its token.
    pub async fn request_email_change(
        pool: &PgPool,
        id: Uuid,
        new_email: &str,
        token_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET pending_email = $2,
                email_change_token_hash = $3,
                email_change_requested_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_email)
        .bind(token_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Applies the pending email change matching `token_hash`
    ///
    /// Requests older than `not_before` are ignored. Returns the updated
    /// account, or None if no live request matches.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the new email was taken in the meantime.
    pub async fn confirm_email_change(
        pool: &PgPool,
        token_hash: &str,
        not_before: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE accounts \
             SET email = pending_email, \
                 pending_email = NULL, \
                 email_change_token_hash = NULL, \
                 email_change_requested_at = NULL, \
                 updated_at = NOW() \
             WHERE email_change_token_hash = $1 \
               AND pending_email IS NOT NULL \
               AND email_change_requested_at > $2 \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(token_hash)
            .bind(not_before)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(household_id: Option<Uuid>) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            email: "taro@example.com".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            display_name: "Taro".to_string(),
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

    #[test]
    fn test_membership_state() {
        assert_eq!(account(None).membership(), MembershipState::Unbound);

        let household_id = Uuid::new_v4();
        let bound = account(Some(household_id));
        assert_eq!(bound.membership(), MembershipState::Bound(household_id));
        assert!(bound.is_member_of(household_id));
        assert!(!bound.is_member_of(Uuid::new_v4()));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut acct = account(None);
        acct.email_change_token_hash = Some("ab".repeat(32));
        acct.password_reset_token_hash = Some("cd".repeat(32));
        acct.password_reset_requested_at = Some(Utc::now());

        let json = serde_json::to_value(&acct).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("email_change_token_hash").is_none());
        assert!(json.get("password_reset_token_hash").is_none());
        assert!(json.get("password_reset_requested_at").is_none());
        assert_eq!(json["email"], "taro@example.com");
    }
}
