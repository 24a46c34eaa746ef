/// Household task model and database operations
///
/// Tasks are the shared moving checklist. Every query is scoped by
/// `household_id`, so a member never sees or edits another household's tasks.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE household_tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     household_id UUID NOT NULL REFERENCES households(id),
///     title VARCHAR(200) NOT NULL,
///     notes TEXT,
///     due_date DATE,
///     assigned_to UUID REFERENCES accounts(id),
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     created_by UUID NOT NULL REFERENCES accounts(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, household_id, title, notes, due_date, assigned_to, completed, \
     created_by, created_at, updated_at";

/// A checklist item belonging to one household
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdTask {
    pub id: Uuid,
    pub household_id: Uuid,

    /// Short description, e.g. "Book the moving truck"
    pub title: String,

    pub notes: Option<String>,

    /// Day the task should be done by; tasks without one stay off the calendar
    pub due_date: Option<NaiveDate>,

    /// Member responsible, if any
    pub assigned_to: Option<Uuid>,

    pub completed: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
}

/// Full replacement of a task's editable fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub completed: bool,
}

impl HouseholdTask {
    /// Creates a task in `household_id`
    ///
    /// The caller is responsible for checking that `assigned_to` is a member.
    pub async fn create(
        pool: &PgPool,
        household_id: Uuid,
        created_by: Uuid,
        data: &NewTask,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO household_tasks (household_id, title, notes, due_date, assigned_to, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(household_id)
            .bind(&data.title)
            .bind(&data.notes)
            .bind(data.due_date)
            .bind(data.assigned_to)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Finds a task by ID within a household
    pub async fn find(
        pool: &PgPool,
        household_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM household_tasks WHERE id = $1 AND household_id = $2"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(id)
            .bind(household_id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a household's tasks: open ones first, then by due date (undated last)
    pub async fn list_by_household(
        pool: &PgPool,
        household_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM household_tasks WHERE household_id = $1 \
             ORDER BY completed ASC, due_date ASC NULLS LAST, created_at ASC"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(household_id)
            .fetch_all(pool)
            .await
    }

    /// Lists dated tasks with `from <= due_date <= to` (calendar view)
    pub async fn list_due_between(
        pool: &PgPool,
        household_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM household_tasks \
             WHERE household_id = $1 AND due_date BETWEEN $2 AND $3 \
             ORDER BY due_date ASC, created_at ASC"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(household_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Replaces a task's editable fields
    pub async fn update(
        pool: &PgPool,
        household_id: Uuid,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE household_tasks \
             SET title = $3, notes = $4, due_date = $5, assigned_to = $6, completed = $7, \
                 updated_at = NOW() \
             WHERE id = $1 AND household_id = $2 RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(id)
            .bind(household_id)
            .bind(&data.title)
            .bind(&data.notes)
            .bind(data.due_date)
            .bind(data.assigned_to)
            .bind(data.completed)
            .fetch_optional(pool)
            .await
    }

    /// Sets the completed flag
    pub async fn set_completed(
        pool: &PgPool,
        household_id: Uuid,
        id: Uuid,
        completed: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE household_tasks SET completed = $3, updated_at = NOW() \
             WHERE id = $1 AND household_id = $2 RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, HouseholdTask>(&query)
            .bind(id)
            .bind(household_id)
            .bind(completed)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a task, returning whether a row was removed
    pub async fn delete(pool: &PgPool, household_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM household_tasks WHERE id = $1 AND household_id = $2")
            .bind(id)
            .bind(household_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Clears `assigned_to` on every task of `household_id` assigned to `account_id`
    ///
    /// Part of member detachment; runs inside the detach transaction.
    pub async fn unassign_member<'e, E>(
        executor: E,
        household_id: Uuid,
        account_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE household_tasks
            SET assigned_to = NULL, updated_at = NOW()
            WHERE household_id = $1 AND assigned_to = $2
            "#,
        )
        .bind(household_id)
        .bind(account_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
