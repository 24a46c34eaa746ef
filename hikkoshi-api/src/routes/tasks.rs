/// Shared task list and calendar view
///
/// Every handler first resolves the caller's household; callers without one
/// get `409 not_in_household`. Tasks of other households are invisible and
/// answer 404.
///
/// - `GET /v1/tasks`, `POST /v1/tasks`
/// - `GET /v1/tasks/:id`, `PUT /v1/tasks/:id`, `DELETE /v1/tasks/:id`
/// - `POST /v1/tasks/:id/complete`
/// - `GET /v1/calendar?from=YYYY-MM-DD&to=YYYY-MM-DD`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::request_context,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Days, NaiveDate, Utc};
use hikkoshi_shared::{
    auth::middleware::AuthContext,
    membership::{service, MembershipError},
    models::task::{HouseholdTask, NewTask, UpdateTask},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Days shown when `to` is omitted
pub const DEFAULT_CALENDAR_DAYS: u64 = 31;

/// Longest range one calendar request may cover
pub const MAX_CALENDAR_DAYS: i64 = 366;

#[derive(Debug, Deserialize, Validate)]
pub struct TaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,

    pub due_date: Option<NaiveDate>,

    /// Must be a member of the caller's household
    pub assigned_to: Option<Uuid>,

    /// Ignored on create
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,

    /// The household's move date, if set and inside the range
    pub move_date: Option<NaiveDate>,

    pub tasks: Vec<HouseholdTask>,
}

/// Resolves the caller's household ID
async fn household_of(state: &AppState, auth: &AuthContext) -> ApiResult<Uuid> {
    let (_, household_id) = service::require_membership(state.store(), &request_context(auth)).await?;
    Ok(household_id)
}

/// Rejects assignees outside the household
async fn check_assignee(
    state: &AppState,
    household_id: Uuid,
    assignee: Option<Uuid>,
) -> ApiResult<()> {
    let Some(assignee) = assignee else {
        return Ok(());
    };

    let is_member = state
        .store()
        .find_account(assignee)
        .await
        .map_err(MembershipError::from)?
        .is_some_and(|account| account.is_member_of(household_id));

    if !is_member {
        return Err(ApiError::invalid_field(
            "assigned_to",
            "Assignee is not a member of this household",
        ));
    }
    Ok(())
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

/// Calendar range: `from` defaults to today, `to` to 31 days later
fn resolve_range(query: &CalendarQuery, today: NaiveDate) -> ApiResult<(NaiveDate, NaiveDate)> {
    let from = query.from.unwrap_or(today);
    let to = match query.to {
        Some(to) => to,
        None => from
            .checked_add_days(Days::new(DEFAULT_CALENDAR_DAYS))
            .ok_or_else(|| ApiError::invalid_field("from", "Date out of range"))?,
    };

    if to < from {
        return Err(ApiError::invalid_field("to", "`to` must not be before `from`"));
    }
    if (to - from).num_days() > MAX_CALENDAR_DAYS {
        return Err(ApiError::invalid_field(
            "to",
            format!("Range must be at most {} days", MAX_CALENDAR_DAYS),
        ));
    }

    Ok((from, to))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<HouseholdTask>>> {
    let household_id = household_of(&state, &auth).await?;
    let tasks = HouseholdTask::list_by_household(&state.db, household_id).await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<(StatusCode, Json<HouseholdTask>)> {
    req.validate()?;
    let household_id = household_of(&state, &auth).await?;
    check_assignee(&state, household_id, req.assigned_to).await?;

    let task = HouseholdTask::create(
        &state.db,
        household_id,
        auth.account_id,
        &NewTask {
            title: req.title.trim().to_string(),
            notes: req.notes,
            due_date: req.due_date,
            assigned_to: req.assigned_to,
        },
    )
    .await?;

    tracing::debug!(task_id = %task.id, household_id = %household_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<HouseholdTask>> {
    let household_id = household_of(&state, &auth).await?;
    let task = HouseholdTask::find(&state.db, household_id, task_id)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(Json(task))
}

/// Replaces all editable fields of a task
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<TaskRequest>,
) -> ApiResult<Json<HouseholdTask>> {
    req.validate()?;
    let household_id = household_of(&state, &auth).await?;
    check_assignee(&state, household_id, req.assigned_to).await?;

    let task = HouseholdTask::update(
        &state.db,
        household_id,
        task_id,
        &UpdateTask {
            title: req.title.trim().to_string(),
            notes: req.notes,
            due_date: req.due_date,
            assigned_to: req.assigned_to,
            completed: req.completed,
        },
    )
    .await?
    .ok_or_else(task_not_found)?;

    Ok(Json(task))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<HouseholdTask>> {
    let household_id = household_of(&state, &auth).await?;
    let task = HouseholdTask::set_completed(&state.db, household_id, task_id, true)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let household_id = household_of(&state, &auth).await?;
    if !HouseholdTask::delete(&state.db, household_id, task_id).await? {
        return Err(task_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Dated tasks and the move date within a date range
pub async fn calendar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<CalendarResponse>> {
    let (from, to) = resolve_range(&query, Utc::now().date_naive())?;
    let household_id = household_of(&state, &auth).await?;

    let move_date = state
        .store()
        .find_household(household_id)
        .await
        .map_err(MembershipError::from)?
        .and_then(|household| household.move_date)
        .filter(|date| (from..=to).contains(date));

    let tasks = HouseholdTask::list_due_between(&state.db, household_id, from, to).await?;

    Ok(Json(CalendarResponse {
        from,
        to,
        move_date,
        tasks,
    }))
}
