/// Invite codes
///
/// A code is a random (v4) UUID in canonical hyphenated form, e.g.
/// `2f1c3b9e-8a47-4d2b-9c1e-5b7a6d4e3f20`. It carries 122 random bits from
/// the OS CSPRNG. The database stores only `hash()`, so a leaked table does
/// not leak redeemable codes.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::MembershipError;

/// Length of the canonical hyphenated form
const CANONICAL_LEN: usize = 36;

/// A syntactically valid invite code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InviteCode(Uuid);

impl InviteCode {
    /// Generates a fresh random code
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        InviteCode(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Parses user input into a code
    ///
    /// Only the canonical hyphenated form is accepted (either case); braced,
    /// URN and unhyphenated spellings are rejected. Surrounding whitespace is
    /// trimmed, since codes are often pasted.
    ///
    /// # Errors
    ///
    /// Returns `MembershipError::Malformed` for anything else.
    pub fn parse(raw: &str) -> Result<Self, MembershipError> {
        let raw = raw.trim();
        if raw.len() != CANONICAL_LEN {
            return Err(MembershipError::Malformed);
        }

        Uuid::try_parse(raw)
            .map(InviteCode)
            .map_err(|_| MembershipError::Malformed)
    }

    /// Hex SHA-256 of the canonical lowercase form; this is what gets stored
    pub fn hash(&self) -> String {
        let canonical = self.0.hyphenated().to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for InviteCode {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InviteCode::parse(s)
    }
}
