/// One-time secret tokens (email change confirmation)
///
/// A token is 43 base62 characters (about 256 bits). It is sent to the user
/// once; only its SHA-256 hex digest is stored, and lookups go by digest.
///
/// # Example
///
/// ```
/// use hikkoshi_shared::auth::token::{generate_secret_token, hash_token, is_well_formed};
///
/// let (token, hash) = generate_secret_token();
/// assert!(is_well_formed(&token));
/// assert_eq!(hash_token(&token), hash);
/// ```

use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};

/// Length of a generated token
pub const TOKEN_LENGTH: usize = 43;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a token and its storage hash
pub fn generate_secret_token() -> (String, String) {
    let token: String = (0..TOKEN_LENGTH)
        .map(|_| CHARSET[OsRng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let hash = hash_token(&token);

    (token, hash)
}

/// Hex SHA-256 of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap syntax check, done before any database lookup
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
