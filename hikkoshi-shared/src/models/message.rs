/// Message model and database operations
///
/// Direct messages between two members of the same household.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE messages (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     household_id UUID NOT NULL REFERENCES households(id),
///     sender_id UUID NOT NULL REFERENCES accounts(id),
///     receiver_id UUID NOT NULL REFERENCES accounts(id),
///     content VARCHAR(500) NOT NULL,
///     is_read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Longest message body accepted, in characters
pub const MAX_CONTENT_CHARS: usize = 500;

const MESSAGE_COLUMNS: &str =
    "id, household_id, sender_id, receiver_id, content, is_read, created_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub household_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub receiver_id: Uuid,
    pub content: String,
}

impl Message {
    /// Stores a message from `sender_id`
    ///
    /// Both parties must already be verified members of `household_id`.
    pub async fn create(
        pool: &PgPool,
        household_id: Uuid,
        sender_id: Uuid,
        data: &NewMessage,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO messages (household_id, sender_id, receiver_id, content) \
             VALUES ($1, $2, $3, $4) RETURNING {MESSAGE_COLUMNS}"
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(household_id)
            .bind(sender_id)
            .bind(data.receiver_id)
            .bind(&data.content)
            .fetch_one(pool)
            .await
    }

    /// Messages received by `account_id` in `household_id`, newest first
    pub async fn inbox(
        pool: &PgPool,
        household_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE household_id = $1 AND receiver_id = $2 \
             ORDER BY created_at DESC LIMIT $3"
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(household_id)
            .bind(account_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Messages sent by `account_id` in `household_id`, newest first
    pub async fn sent(
        pool: &PgPool,
        household_id: Uuid,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE household_id = $1 AND sender_id = $2 \
             ORDER BY created_at DESC LIMIT $3"
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(household_id)
            .bind(account_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Marks a message read; only its receiver can do so
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE messages SET is_read = TRUE \
             WHERE id = $1 AND receiver_id = $2 RETURNING {MESSAGE_COLUMNS}"
        );

        sqlx::query_as::<_, Message>(&query)
            .bind(id)
            .bind(receiver_id)
            .fetch_optional(pool)
            .await
    }

    /// Number of unread messages for `account_id` in `household_id`
    pub async fn unread_count(
        pool: &PgPool,
        household_id: Uuid,
        account_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE household_id = $1 AND receiver_id = $2 AND is_read = FALSE",
        )
        .bind(household_id)
        .bind(account_id)
        .fetch_one(pool)
        .await
    }
}
