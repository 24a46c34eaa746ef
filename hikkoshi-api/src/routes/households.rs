/// Household endpoints
///
/// - `POST /v1/households` - Create a household owned by the caller
/// - `GET /v1/households/current` - The caller's household
/// - `POST /v1/households/leave` - Leave the caller's household (non-owners)
/// - `PUT /v1/households/:id/move-date` - Set or clear the move date (members)
/// - `GET /v1/households/:id/members` - List members (members)
/// - `DELETE /v1/households/:id/members/:account_id` - Remove a member (owner)

use crate::{app::AppState, error::ApiResult, routes::request_context};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use hikkoshi_shared::{
    auth::middleware::AuthContext,
    membership::{service, MembershipError},
    models::household::{Household, NewHousehold},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHouseholdRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    pub move_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MoveDateRequest {
    /// `null` clears the date
    pub move_date: Option<NaiveDate>,
}

/// Member as seen by other members
#[derive(Debug, Serialize)]
pub struct MemberView {
    pub account_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub is_owner: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentHouseholdResponse {
    /// `null` when the caller is not in a household
    pub household: Option<Household>,
    pub is_owner: bool,
}

/// Creates a household; the caller becomes its owner and first member
///
/// # Errors
///
/// - `409 Conflict`: The caller already belongs to a household
pub async fn create_household(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateHouseholdRequest>,
) -> ApiResult<(StatusCode, Json<Household>)> {
    req.validate()?;

    let household = service::create_household(
        state.store(),
        &request_context(&auth),
        &NewHousehold {
            name: req.name.trim().to_string(),
            move_date: req.move_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(household)))
}

pub async fn current_household(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CurrentHouseholdResponse>> {
    let household = service::current_household(state.store(), &request_context(&auth)).await?;
    let is_owner = household
        .as_ref()
        .is_some_and(|household| household.is_owner(auth.account_id));

    Ok(Json(CurrentHouseholdResponse {
        household,
        is_owner,
    }))
}

/// Leaves the caller's household; tasks assigned to the caller are unassigned
///
/// # Errors
///
/// - `409 Conflict`: Not in a household, or the caller is the owner
pub async fn leave_household(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    service::leave_household(state.store(), &request_context(&auth)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_move_date(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(household_id): Path<Uuid>,
    Json(req): Json<MoveDateRequest>,
) -> ApiResult<Json<Household>> {
    let household = service::update_move_date(
        state.store(),
        &request_context(&auth),
        household_id,
        req.move_date,
    )
    .await?;

    Ok(Json(household))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(household_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MemberView>>> {
    let ctx = request_context(&auth);
    let members = service::list_members(state.store(), &ctx, household_id).await?;
    let owner_id = state
        .store()
        .find_household(household_id)
        .await
        .map_err(MembershipError::from)?
        .map(|household| household.owner_id);

    Ok(Json(
        members
            .into_iter()
            .map(|account| MemberView {
                is_owner: Some(account.id) == owner_id,
                account_id: account.id,
                display_name: account.display_name,
                email: account.email,
            })
            .collect(),
    ))
}

/// Removes a member; owner only
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the owner (or the household does not exist)
/// - `409 Conflict`: Target is the owner, or not a member
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((household_id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    service::remove_member(
        state.store(),
        &request_context(&auth),
        household_id,
        account_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
