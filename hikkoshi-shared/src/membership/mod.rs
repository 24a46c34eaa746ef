/// Household membership: invites, binding and ownership rules
///
/// This module is the core of Hikkoshi. An owner issues single-use,
/// time-boxed invite codes for their household; redeeming one attaches an
/// account to that household, either at signup or later while logged in.
///
/// # Membership State
///
/// ```text
///              signup with invite / redeem invite
///   Unbound ───────────────────────────────────────> Bound(household)
///      ^                                               │   │
///      │          owner removes member / leave         │   │ redeem invite for
///      └───────────────────────────────────────────────┘   │ the same household
///                                                          └──> no-op
/// ```
///
/// An account is bound to at most one household. Redeeming an invite for a
/// different household while bound fails with `AlreadyInHousehold`.
///
/// # Layers
///
/// - [`code`]: the shareable invite code and its stored hash
/// - [`policy`]: expiry and the pure `validate` check
/// - [`store`]: the `MembershipStore` trait; every multi-row change is one
///   atomic call
/// - [`postgres`] / [`memory`]: store implementations
/// - [`service`]: the operations the HTTP layer calls
///
/// # Example
///
/// ```no_run
/// use hikkoshi_shared::membership::{
///     service, InvitePolicy, MemoryMembershipStore, RequestContext,
/// };
/// use hikkoshi_shared::models::household::NewHousehold;
/// use uuid::Uuid;
///
/// # async fn example(owner_id: Uuid, guest_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryMembershipStore::new();
/// let owner = RequestContext::new(owner_id);
///
/// let household = service::create_household(&store, &owner, &NewHousehold {
///     name: "Tanaka family move".to_string(),
///     move_date: None,
/// }).await?;
///
/// let issued = service::issue_invite(&store, &InvitePolicy::default(), &owner, household.id).await?;
/// service::redeem_invite(&store, &RequestContext::new(guest_id), &issued.code.to_string()).await?;
/// # Ok(())
/// # }
/// ```

pub mod code;
pub mod context;
pub mod error;
pub mod memory;
pub mod policy;
pub mod postgres;
pub mod service;
pub mod store;

use serde::Serialize;
use uuid::Uuid;

pub use code::InviteCode;
pub use context::RequestContext;
pub use error::{MembershipError, StoreError};
pub use memory::MemoryMembershipStore;
pub use policy::{validate, InvitePolicy, InviteStatus, PolicyError};
pub use postgres::PgMembershipStore;
pub use store::{BindOutcome, HouseholdOutcome, MembershipStore, SignupOutcome};

/// Whether an account belongs to a household
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "household_id", rename_all = "snake_case")]
pub enum MembershipState {
    Unbound,
    Bound(Uuid),
}

/// Builds the shareable link for an invite code
///
/// `base_url` is the public origin of the service; a trailing slash is ignored.
pub fn invite_url(base_url: &str, code: &InviteCode) -> String {
    format!("{}/invite?invite={}", base_url.trim_end_matches('/'), code)
}
