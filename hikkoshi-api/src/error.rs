/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; the body is always
///
/// ```json
/// { "error": "invite_expired", "message": "Invite has expired" }
/// ```
///
/// with an optional `details` array for field validation failures.
///
/// # Membership errors
///
/// | Variant              | Status |
/// |----------------------|--------|
/// | `Malformed`          | 400    |
/// | `NotFound`           | 404    |
/// | `Expired`            | 410    |
/// | `AlreadyUsed`        | 410    |
/// | `PermissionDenied`   | 403    |
/// | `AlreadyInHousehold` | 409    |
/// | `NotInHousehold`     | 409    |
/// | `CannotRemoveOwner`  | 409    |
/// | `EmailTaken`         | 409    |
/// | `Policy`             | 500    |
/// | `Store`              | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hikkoshi_shared::{
    auth::{jwt::JwtError, password::PasswordError},
    membership::MembershipError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Invite and household rules; carries its own code and status
    Membership(MembershipError),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "invite_expired")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }
}

fn membership_status(err: &MembershipError) -> StatusCode {
    match err {
        MembershipError::Malformed => StatusCode::BAD_REQUEST,
        MembershipError::NotFound => StatusCode::NOT_FOUND,
        MembershipError::Expired | MembershipError::AlreadyUsed => StatusCode::GONE,
        MembershipError::PermissionDenied => StatusCode::FORBIDDEN,
        MembershipError::AlreadyInHousehold
        | MembershipError::NotInHousehold
        | MembershipError::CannotRemoveOwner
        | MembershipError::EmailTaken => StatusCode::CONFLICT,
        MembershipError::Policy(_) | MembershipError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Membership(err) => write!(f, "{}", err),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::Membership(err @ (MembershipError::Store(_) | MembershipError::Policy(_))) => {
                tracing::error!(error = %err, "Membership operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::Membership(err) => {
                (membership_status(&err), err.code(), err.to_string(), None)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        ApiError::Membership(err)
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Resource already exists".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert validator derive output to a 422 with per-field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    ValidationErrorDetail::new(
                        field.to_string(),
                        error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Validation failed".to_string()),
                    )
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hikkoshi_shared::membership::{PolicyError, StoreError};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::Membership(MembershipError::Expired);
        assert_eq!(err.to_string(), "Invite has expired");
    }

    #[test]
    fn test_membership_status_mapping() {
        let cases = [
            (MembershipError::Malformed, StatusCode::BAD_REQUEST),
            (MembershipError::NotFound, StatusCode::NOT_FOUND),
            (MembershipError::Expired, StatusCode::GONE),
            (MembershipError::AlreadyUsed, StatusCode::GONE),
            (MembershipError::PermissionDenied, StatusCode::FORBIDDEN),
            (MembershipError::AlreadyInHousehold, StatusCode::CONFLICT),
            (MembershipError::NotInHousehold, StatusCode::CONFLICT),
            (MembershipError::CannotRemoveOwner, StatusCode::CONFLICT),
            (MembershipError::EmailTaken, StatusCode::CONFLICT),
        ];

        for (err, status) in cases {
            let code = err.code();
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status, "status for {code}");
        }
    }

    #[tokio::test]
    async fn test_membership_body_carries_code() {
        let response = ApiError::from(MembershipError::AlreadyUsed).into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"], "invite_already_used");
        assert_eq!(body["message"], "Invite has already been used");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_hidden() {
        let err = MembershipError::Store(StoreError::Unavailable("pg down at 10.0.0.3".into()));
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert!(!body["message"].as_str().unwrap().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_policy_failure_is_internal() {
        let err = MembershipError::Policy(PolicyError::ExpiryOutOfRange);
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "internal_error");
    }

    #[tokio::test]
    async fn test_validation_error() {
        let err = ApiError::ValidationError(vec![
            ValidationErrorDetail::new("email", "Invalid email format"),
            ValidationErrorDetail::new("password", "Password too short"),
        ]);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][1]["field"], "password");
    }
}
