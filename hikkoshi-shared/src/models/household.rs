/// Household model and database operations
///
/// A household is one shared moving project. Its owner created it and is
/// always a member; other accounts join through invites.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE households (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES accounts(id),
///     name VARCHAR(100) NOT NULL,
///     move_date DATE,
///     last_updated_by UUID REFERENCES accounts(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const HOUSEHOLD_COLUMNS: &str =
    "id, owner_id, name, move_date, last_updated_by, created_at, updated_at";

/// A household ("MoveInfo")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Household {
    /// Unique household ID
    pub id: Uuid,

    /// Account that created the household
    pub owner_id: Uuid,

    /// Display name, e.g. "Tanaka family move"
    pub name: String,

    /// Planned moving day
    pub move_date: Option<NaiveDate>,

    /// Member who last changed the household details
    pub last_updated_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a household
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHousehold {
    /// Display name
    pub name: String,

    /// Planned moving day, if already known
    pub move_date: Option<NaiveDate>,
}

impl Household {
    /// Whether `account_id` owns this household
    pub fn is_owner(&self, account_id: Uuid) -> bool {
        self.owner_id == account_id
    }

    /// Inserts a household row owned by `owner_id`
    ///
    /// Does not bind the owner; see `PgMembershipStore::create_household`.
    pub async fn insert<'e, E>(
        executor: E,
        owner_id: Uuid,
        data: &NewHousehold,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO households (owner_id, name, move_date, last_updated_by) \
             VALUES ($1, $2, $3, $1) RETURNING {HOUSEHOLD_COLUMNS}"
        );

        sqlx::query_as::<_, Household>(&query)
            .bind(owner_id)
            .bind(&data.name)
            .bind(data.move_date)
            .fetch_one(executor)
            .await
    }

    /// Finds a household by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {HOUSEHOLD_COLUMNS} FROM households WHERE id = $1");

        sqlx::query_as::<_, Household>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Sets (or clears) the move date and records who changed it
    pub async fn update_move_date<'e, E>(
        executor: E,
        id: Uuid,
        move_date: Option<NaiveDate>,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE households \
             SET move_date = $2, last_updated_by = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {HOUSEHOLD_COLUMNS}"
        );

        sqlx::query_as::<_, Household>(&query)
            .bind(id)
            .bind(move_date)
            .bind(updated_by)
            .fetch_optional(executor)
            .await
    }
}
