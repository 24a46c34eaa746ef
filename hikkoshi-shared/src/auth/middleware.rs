/// Bearer-token authentication for axum
///
/// `jwt_auth_middleware` rejects requests without a valid access token and
/// stores an `AuthContext` in the request extensions.
/// `optional_jwt_auth_middleware` is for public routes that behave differently
/// for logged-in callers (the invite preview): it inserts the context when a
/// valid token is present and otherwise lets the request through untouched.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use hikkoshi_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     auth.account_id.to_string()
/// }
///
/// let secret = "a-secret-of-at-least-thirty-two-bytes!".to_string();
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(move |req, next| {
///         jwt_auth_middleware(secret.clone(), req, next)
///     }));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub account_id: Uuid,
}

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidFormat(String),
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
        };

        (
            status,
            Json(serde_json::json!({ "error": code, "message": message })),
        )
            .into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(Some)
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

fn authenticate(token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    Ok(AuthContext {
        account_id: claims.sub,
    })
}

/// Requires a valid `Authorization: Bearer <access token>` header
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?.ok_or(AuthError::MissingCredentials)?;
    let auth = authenticate(token, &secret)?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Adds an `AuthContext` if, and only if, a valid access token is present
pub async fn optional_jwt_auth_middleware(secret: String, mut req: Request, next: Next) -> Response {
    let auth = match bearer_token(req.headers()) {
        Ok(Some(token)) => authenticate(token, &secret).ok(),
        _ => None,
    };

    if let Some(auth) = auth {
        req.extensions_mut().insert(auth);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims, TokenType};
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Ok(None)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(matches!(bearer_token(&headers), Ok(Some("abc"))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat(_))));
    }

    #[test]
    fn test_authenticate_accepts_access_tokens_only() {
        let account_id = Uuid::new_v4();

        let access = create_token(&Claims::new(account_id, TokenType::Access), SECRET).unwrap();
        assert_eq!(authenticate(&access, SECRET).unwrap().account_id, account_id);

        let refresh = create_token(&Claims::new(account_id, TokenType::Refresh), SECRET).unwrap();
        assert!(matches!(
            authenticate(&refresh, SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidToken("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
