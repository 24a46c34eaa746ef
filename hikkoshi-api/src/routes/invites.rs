/// Invite endpoints
///
/// - `POST /v1/households/:id/invites` - Issue an invite (owner)
/// - `GET /v1/households/:id/invites` - Audit list of issued invites (owner)
/// - `GET /invite?invite={code}` - Preview an invite link (public, optional auth)
/// - `POST /v1/invites/redeem` - Join the invite's household (authenticated)
///
/// The raw code appears only in the issuance response. The preview endpoint
/// never consumes an invite; only redemption and signup do.

use crate::{app::AppState, error::ApiResult, routes::request_context};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hikkoshi_shared::{
    auth::middleware::AuthContext,
    membership::{
        invite_url,
        service::{self, InvitePreview, RedeemOutcome},
        MembershipError,
    },
    models::{household::Household, invite::Invite},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Freshly issued invite
#[derive(Debug, Serialize)]
pub struct IssueInviteResponse {
    pub invite_id: Uuid,
    pub code: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub invite: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub invite: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemStatus {
    Joined,
    AlreadyMember,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub status: RedeemStatus,
    pub household: Household,
}

/// Issues an invite for a household the caller owns
///
/// # Response
///
/// ```json
/// {
///   "invite_id": "uuid",
///   "code": "2f1c3b9e-8a47-4d2b-9c1e-5b7a6d4e3f20",
///   "url": "https://hikkoshi.example/invite?invite=2f1c3b9e-8a47-4d2b-9c1e-5b7a6d4e3f20",
///   "expires_at": "2026-10-20T09:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Not the owner, or no such household
pub async fn issue_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(household_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<IssueInviteResponse>)> {
    let policy = state.invite_policy().map_err(MembershipError::from)?;
    let issued = service::issue_invite(
        state.store(),
        &policy,
        &request_context(&auth),
        household_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueInviteResponse {
            invite_id: issued.invite.id,
            code: issued.code.to_string(),
            url: invite_url(&state.config.api.base_url, &issued.code),
            expires_at: issued.invite.expires_at,
        }),
    ))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(household_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Invite>>> {
    let invites = service::list_invites(state.store(), &request_context(&auth), household_id).await?;
    Ok(Json(invites))
}

/// Entry point for shared invite links
///
/// Applies the same checks a redemption would and reports what the viewer
/// can do next: `signup` when anonymous, `join` when logged in and unbound,
/// `already_member` when logged in to this household.
pub async fn preview_invite(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<Json<InvitePreview>> {
    let code = query.invite.ok_or(MembershipError::Malformed)?;
    let viewer = auth.map(|Extension(auth)| auth.account_id);

    let preview = service::inspect_invite(state.store(), &code, viewer, Utc::now()).await?;
    Ok(Json(preview))
}

/// Redeems an invite for the logged-in account
///
/// Redeeming an invite for the caller's current household succeeds without
/// consuming it (`"status": "already_member"`).
///
/// # Errors
///
/// - `400`/`404`: Malformed or unknown code
/// - `410 Gone`: Expired or already used
/// - `409 Conflict`: The caller belongs to another household
pub async fn redeem_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<Json<RedeemResponse>> {
    let outcome = service::redeem_invite(state.store(), &request_context(&auth), &req.invite).await?;

    let (status, household) = match outcome {
        RedeemOutcome::Joined(household) => (RedeemStatus::Joined, household),
        RedeemOutcome::AlreadyMember(household) => (RedeemStatus::AlreadyMember, household),
    };

    Ok(Json(RedeemResponse { status, household }))
}
