/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: HS256 access/refresh session tokens
/// - [`middleware`]: axum middleware that turns a bearer token into an `AuthContext`
/// - [`token`]: one-time secret tokens stored as SHA-256 digests
///
/// # Example
///
/// ```no_run
/// use hikkoshi_shared::auth::password::{hash_password, verify_password};
/// use hikkoshi_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("cardboard7")?;
/// if verify_password("cardboard7", &hash)? {
///     let tokens = issue_token_pair(Uuid::new_v4(), "a-secret-of-at-least-thirty-two-bytes!")?;
///     println!("{}", tokens.access_token);
/// }
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;
