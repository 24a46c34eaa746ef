/// Messages between members of one household
///
/// - `POST /v1/messages` - Send a message to another member
/// - `GET /v1/messages/inbox?limit=` - Received messages, newest first
/// - `GET /v1/messages/sent?limit=` - Sent messages, newest first
/// - `GET /v1/messages/unread-count`
/// - `POST /v1/messages/:id/read` - Mark a received message read

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
use hikkoshi_shared::{
    auth::middleware::AuthContext,
    membership::{service, MembershipError},
    models::message::{Message, NewMessage},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,

    #[validate(
        length(min = 1, max = 500, message = "Content must be 1 to 500 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

fn not_blank(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Content must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

async fn household_of(state: &AppState, auth: &AuthContext) -> ApiResult<Uuid> {
    let (_, household_id) = service::require_membership(state.store(), &request_context(auth)).await?;
    Ok(household_id)
}

/// Sends a message to another member of the caller's household
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Empty or over-long content, or receiver is
///   the sender or not a member of the household
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    req.validate()?;

    let household_id = household_of(&state, &auth).await?;

    if req.receiver_id == auth.account_id {
        return Err(ApiError::invalid_field(
            "receiver_id",
            "Cannot send a message to yourself",
        ));
    }

    let receiver_is_member = state
        .store()
        .find_account(req.receiver_id)
        .await
        .map_err(MembershipError::from)?
        .is_some_and(|account| account.is_member_of(household_id));
    if !receiver_is_member {
        return Err(ApiError::invalid_field(
            "receiver_id",
            "Receiver is not a member of this household",
        ));
    }

    let message = Message::create(
        &state.db,
        household_id,
        auth.account_id,
        &NewMessage {
            receiver_id: req.receiver_id,
            content: req.content,
        },
    )
    .await?;

    tracing::debug!(message_id = %message.id, household_id = %household_id, "Message sent");
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn inbox(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let household_id = household_of(&state, &auth).await?;
    let messages = Message::inbox(&state.db, household_id, auth.account_id, query.limit()).await?;
    Ok(Json(messages))
}

pub async fn sent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let household_id = household_of(&state, &auth).await?;
    let messages = Message::sent(&state.db, household_id, auth.account_id, query.limit()).await?;
    Ok(Json(messages))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let household_id = household_of(&state, &auth).await?;
    let unread = Message::unread_count(&state.db, household_id, auth.account_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Marks a message read; only its receiver may do so
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    household_of(&state, &auth).await?;
    let message = Message::mark_read(&state.db, message_id, auth.account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;
    Ok(Json(message))
}
