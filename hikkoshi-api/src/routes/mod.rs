/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Signup, login, token refresh, profile and email change
/// - `households`: Household creation, members and move date
/// - `invites`: Invite issuance, preview and redemption
/// - `tasks`: Shared task list and calendar view
/// - `messages`: Messages between members of one household

pub mod auth;
pub mod health;
pub mod households;
pub mod invites;
pub mod messages;
pub mod tasks;

use hikkoshi_shared::{auth::middleware::AuthContext, membership::RequestContext};

/// Per-request context for membership operations
pub(crate) fn request_context(auth: &AuthContext) -> RequestContext {
    RequestContext::new(auth.account_id)
}
