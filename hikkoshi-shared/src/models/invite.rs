/// Invite model and database operations
///
/// Only the SHA-256 of an invite code is stored; the raw code leaves the server
/// once, in the issuance response. Rows are never deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invites (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     code_hash CHAR(64) NOT NULL UNIQUE,
///     household_id UUID NOT NULL REFERENCES households(id),
///     issued_by UUID NOT NULL REFERENCES accounts(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     used BOOLEAN NOT NULL DEFAULT FALSE,
///     used_by UUID REFERENCES accounts(id),
///     used_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const INVITE_COLUMNS: &str =
    "id, code_hash, household_id, issued_by, created_at, expires_at, used, used_by, used_at";

/// A stored invite token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invite {
    /// Row ID (not the shareable code)
    pub id: Uuid,

    /// Hex SHA-256 of the shareable code
    #[serde(skip_serializing)]
    pub code_hash: String,

    /// Household the invite grants membership in
    pub household_id: Uuid,

    /// Owner who issued the invite
    pub issued_by: Uuid,

    /// Issuance time
    pub created_at: DateTime<Utc>,

    /// Absolute expiry, fixed at issuance
    pub expires_at: DateTime<Utc>,

    /// Set once, never cleared
    pub used: bool,

    /// Account that redeemed the invite
    pub used_by: Option<Uuid>,

    /// When the invite was redeemed
    pub used_at: Option<DateTime<Utc>>,
}

/// Input for storing a freshly issued invite
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub code_hash: String,
    pub household_id: Uuid,
    pub issued_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    /// Inserts an invite row
    pub async fn insert<'e, E>(executor: E, data: &NewInvite) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO invites (code_hash, household_id, issued_by, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {INVITE_COLUMNS}"
        );

        sqlx::query_as::<_, Invite>(&query)
            .bind(&data.code_hash)
            .bind(data.household_id)
            .bind(data.issued_by)
            .bind(data.created_at)
            .bind(data.expires_at)
            .fetch_one(executor)
            .await
    }

    /// Finds an invite by the hash of its code
    pub async fn find_by_code_hash<'e, E>(
        executor: E,
        code_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {INVITE_COLUMNS} FROM invites WHERE code_hash = $1");

        sqlx::query_as::<_, Invite>(&query)
            .bind(code_hash)
            .fetch_optional(executor)
            .await
    }

    /// Lists a household's invites, newest first
    pub async fn list_by_household<'e, E>(
        executor: E,
        household_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE household_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Invite>(&query)
            .bind(household_id)
            .fetch_all(executor)
            .await
    }

    /// Marks the invite used if, and only if, it is still unused and unexpired
    ///
    /// This is the single guarded write behind every redemption: the row count
    /// decides which of two racing requests wins.
    pub async fn consume<'e, E>(
        executor: E,
        id: Uuid,
        used_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE invites
            SET used = TRUE, used_by = $2, used_at = $3
            WHERE id = $1 AND used = FALSE AND expires_at > $3
            "#,
        )
        .bind(id)
        .bind(used_by)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
