use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who is asking, and when
///
/// Built once per request from the authenticated session and passed to every
/// membership operation. Carrying `now` explicitly keeps expiry checks
/// deterministic in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub account_id: Uuid,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    /// Context for `account_id` at the current time
    pub fn new(account_id: Uuid) -> Self {
        RequestContext::at(account_id, Utc::now())
    }

    /// Context for `account_id` at a fixed instant
    pub fn at(account_id: Uuid, now: DateTime<Utc>) -> Self {
        RequestContext { account_id, now }
    }
}
