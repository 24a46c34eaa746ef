/// Account and session endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/signup` - Create an account, optionally through an invite
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/email/confirm` - Confirm a pending email change
/// - `POST /v1/auth/password/reset` - Mail a password reset link
/// - `POST /v1/auth/password/reset/confirm` - Set a new password with a reset token
/// - `GET /v1/me` - Current account (authenticated)
/// - `PATCH /v1/me` - Change the display name (authenticated)
/// - `POST /v1/me/email` - Request an email change (authenticated)
/// - `POST /v1/me/password` - Change the password (authenticated)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use hikkoshi_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password, token,
    },
    membership::{postgres::is_email_conflict, service, MembershipError, MembershipState},
    models::{
        account::{Account, NewAccount},
        household::Household,
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// How long an email change confirmation token stays valid
pub const EMAIL_CHANGE_TTL_HOURS: i64 = 24;

/// How long a password reset token stays valid
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    /// Strength is checked separately
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub display_name: String,

    /// Invite code; when present the account joins the invite's household
    pub invite: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Signup and login response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub account: Account,
    pub membership: MembershipState,

    /// Set when signup joined a household through an invite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household: Option<Household>,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Current account
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub membership: MembershipState,
}

/// Email change request
#[derive(Debug, Deserialize, Validate)]
pub struct EmailChangeRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub new_email: String,

    /// Current password, re-checked before the change is recorded
    pub password: String,
}

/// Pending email change
///
/// Mail delivery is out of scope; the confirmation token is returned here
/// and must be posted to `/v1/auth/email/confirm`.
#[derive(Debug, Serialize)]
pub struct EmailChangeResponse {
    pub pending_email: String,
    pub confirmation_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Email change confirmation
#[derive(Debug, Deserialize)]
pub struct ConfirmEmailRequest {
    pub token: String,
}

/// Display name change
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub display_name: String,
}

/// Password change for the logged-in account
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Password reset request
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Reply to every well-formed reset request, whether or not the email exists
#[derive(Debug, Serialize)]
pub struct PasswordResetAccepted {
    pub status: &'static str,
}

/// Password reset confirmation
#[derive(Debug, Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    pub new_password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Creates an account
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "hanako@example.com",
///   "password": "dan-boru-42",
///   "display_name": "Hanako",
///   "invite": "2f1c3b9e-8a47-4d2b-9c1e-5b7a6d4e3f20"
/// }
/// ```
///
/// Without `invite` the account starts unbound. With it, the account is
/// created bound to the invite's household and the invite is consumed in the
/// same transaction.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already registered (`email_taken`)
/// - `400`/`404`/`410`: Invite malformed, unknown, expired or used
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid_field("password", message))?;

    let new_account = NewAccount {
        email: normalize_email(&req.email),
        password_hash: password::hash_password(&req.password)?,
        display_name: req.display_name.trim().to_string(),
    };

    let (account, household) = match req.invite.as_deref() {
        Some(code) => {
            let (account, household) =
                service::signup_with_invite(state.store(), code, &new_account, Utc::now()).await?;
            (account, Some(household))
        }
        None => (service::register_account(state.store(), &new_account).await?, None),
    };

    let tokens = jwt::issue_token_pair(account.id, state.jwt_secret())?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            membership: account.membership(),
            account,
            household,
            tokens,
        }),
    ))
}

/// Authenticates with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (same message for both)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let account = state
        .store()
        .find_account_by_email(req.email.trim())
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &account.password_hash)? {
        tracing::debug!(account_id = %account.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    state
        .store()
        .record_login(account.id)
        .await
        .map_err(MembershipError::from)?;

    let tokens = jwt::issue_token_pair(account.id, state.jwt_secret())?;

    Ok(Json(SessionResponse {
        membership: account.membership(),
        account,
        household: None,
        tokens,
    }))
}

/// Exchanges a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer",
        expires_in: jwt::TokenType::Access.lifetime().num_seconds(),
    }))
}

/// Returns the logged-in account
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let account = state
        .store()
        .find_account(auth.account_id)
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(MeResponse {
        membership: account.membership(),
        account,
    }))
}

/// Changes the logged-in account's display name
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<MeResponse>> {
    req.validate()?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::invalid_field("display_name", "Name must not be blank"));
    }

    let account = state
        .store()
        .update_display_name(auth.account_id, display_name)
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    Ok(Json(MeResponse {
        membership: account.membership(),
        account,
    }))
}

/// Changes the logged-in account's password
///
/// Any outstanding reset token stops working.
///
/// # Errors
///
/// - `401 Unauthorized`: Wrong current password
/// - `422 Unprocessable Entity`: New password too weak
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let account = state
        .store()
        .find_account(auth.account_id)
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if !password::verify_password(&req.current_password, &account.password_hash)? {
        tracing::debug!(account_id = %account.id, "Password change rejected: wrong password");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let password_hash = password::hash_password(&req.new_password)?;
    state
        .store()
        .update_password(account.id, &password_hash)
        .await
        .map_err(MembershipError::from)?;

    tracing::info!(account_id = %account.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Mails a password reset link
///
/// Always answers `202 Accepted` for a well-formed email so the response
/// does not reveal which addresses are registered. The link points at
/// `{APP_BASE_URL}/reset-password?token=...` and works once within
/// `PASSWORD_RESET_TTL_HOURS`.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<(StatusCode, Json<PasswordResetAccepted>)> {
    req.validate()?;

    let accepted = (
        StatusCode::ACCEPTED,
        Json(PasswordResetAccepted { status: "accepted" }),
    );

    let Some(account) = state
        .store()
        .find_account_by_email(req.email.trim())
        .await
        .map_err(MembershipError::from)?
    else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(accepted);
    };

    let (reset_token, token_hash) = token::generate_secret_token();
    state
        .store()
        .request_password_reset(account.id, &token_hash, Utc::now())
        .await
        .map_err(MembershipError::from)?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.config.api.base_url, reset_token
    );
    let body = format!(
        "Hello {},\n\n\
         Use the link below to choose a new password. It expires in {} hour(s) \
         and works once.\n\n{}\n\n\
         If you did not ask for this, ignore this message.",
        account.display_name, PASSWORD_RESET_TTL_HOURS, reset_url
    );

    if let Err(e) = state
        .email_sender
        .send(&account.email, "Reset your Hikkoshi password", &body)
        .await
    {
        tracing::error!(account_id = %account.id, error = %e, "Failed to send password reset email");
    } else {
        tracing::info!(account_id = %account.id, "Password reset link sent");
    }

    Ok(accepted)
}

/// Sets a new password using a reset token
///
/// # Errors
///
/// - `400 Bad Request`: The token is not syntactically valid
/// - `422 Unprocessable Entity`: New password too weak
/// - `404 Not Found`: No live reset matches the token (unknown, used or expired)
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPasswordResetRequest>,
) -> ApiResult<StatusCode> {
    if !token::is_well_formed(&req.token) {
        return Err(ApiError::BadRequest("Malformed reset token".to_string()));
    }

    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let password_hash = password::hash_password(&req.new_password)?;
    let not_before = Utc::now() - Duration::hours(PASSWORD_RESET_TTL_HOURS);

    let account = state
        .store()
        .reset_password(&token::hash_token(&req.token), not_before, &password_hash)
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(|| ApiError::NotFound("Reset token not found or expired".to_string()))?;

    tracing::info!(account_id = %account.id, "Password reset completed");
    Ok(StatusCode::NO_CONTENT)
}

/// Records a pending email change for the logged-in account
///
/// A new request replaces any earlier one, invalidating its token.
///
/// # Errors
///
/// - `401 Unauthorized`: Wrong current password
/// - `409 Conflict`: The new address belongs to another account (`email_taken`)
pub async fn request_email_change(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EmailChangeRequest>,
) -> ApiResult<Json<EmailChangeResponse>> {
    req.validate()?;
    let new_email = normalize_email(&req.new_email);

    let account = state
        .store()
        .find_account(auth.account_id)
        .await
        .map_err(MembershipError::from)?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    if !password::verify_password(&req.password, &account.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    if account.email.eq_ignore_ascii_case(&new_email) {
        return Err(ApiError::invalid_field(
            "new_email",
            "New email is the current email",
        ));
    }

    let taken = state
        .store()
        .find_account_by_email(&new_email)
        .await
        .map_err(MembershipError::from)?
        .is_some();
    if taken {
        return Err(MembershipError::EmailTaken.into());
    }

    let (confirmation_token, token_hash) = token::generate_secret_token();
    if !Account::request_email_change(&state.db, account.id, &new_email, &token_hash).await? {
        return Err(ApiError::Unauthorized("Account no longer exists".to_string()));
    }

    tracing::info!(account_id = %account.id, "Email change requested");

    Ok(Json(EmailChangeResponse {
        pending_email: new_email,
        confirmation_token,
        expires_at: Utc::now() + Duration::hours(EMAIL_CHANGE_TTL_HOURS),
    }))
}

/// Applies a pending email change
///
/// # Errors
///
/// - `400 Bad Request`: The token is not syntactically valid
/// - `404 Not Found`: No live request matches the token
/// - `409 Conflict`: The address was registered by someone else meanwhile
pub async fn confirm_email_change(
    State(state): State<AppState>,
    Json(req): Json<ConfirmEmailRequest>,
) -> ApiResult<Json<MeResponse>> {
    if !token::is_well_formed(&req.token) {
        return Err(ApiError::BadRequest("Malformed confirmation token".to_string()));
    }

    let not_before = Utc::now() - Duration::hours(EMAIL_CHANGE_TTL_HOURS);
    let account =
        match Account::confirm_email_change(&state.db, &token::hash_token(&req.token), not_before)
            .await
        {
            Ok(Some(account)) => account,
            Ok(None) => {
                return Err(ApiError::NotFound(
                    "Email change request not found or expired".to_string(),
                ))
            }
            Err(e) if is_email_conflict(&e) => return Err(MembershipError::EmailTaken.into()),
            Err(e) => return Err(e.into()),
        };

    tracing::info!(account_id = %account.id, "Email change confirmed");

    Ok(Json(MeResponse {
        membership: account.membership(),
        account,
    }))
}
