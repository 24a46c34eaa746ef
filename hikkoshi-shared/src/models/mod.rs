/// Database models for Hikkoshi
///
/// This module contains the row types and their PostgreSQL operations.
///
/// # Models
///
/// - `account`: User accounts, login and email change
/// - `household`: One shared moving project ("MoveInfo") and its move date
/// - `invite`: Single-use, time-boxed household invites
/// - `task`: Household checklist items (also backing the calendar view)
/// - `message`: Direct messages between members of a household
///
/// The membership-changing writes (household creation, invite redemption,
/// member removal) are not exposed here; they go through
/// [`crate::membership::MembershipStore`] so that each runs in one transaction.
///
/// # Example
///
/// ```no_run
/// use hikkoshi_shared::models::account::Account;
/// use hikkoshi_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/hikkoshi", 5)).await?;
///
/// if let Some(account) = Account::find_by_email(&pool, "hanako@example.com").await? {
///     println!("{} belongs to {:?}", account.email, account.household_id);
/// }
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod household;
pub mod invite;
pub mod message;
pub mod task;
