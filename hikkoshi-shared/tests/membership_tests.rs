/// Integration tests for the household membership lifecycle
///
/// These run against `MemoryMembershipStore` and need no database. The same
/// scenarios against PostgreSQL live in `pg_membership_tests.rs`.

use chrono::{DateTime, Duration, Utc};
use hikkoshi_shared::membership::{
    service::{self, InviteAction, IssuedInvite, RedeemOutcome},
    validate, InvitePolicy, InviteStatus, MembershipError, MembershipStore,
    MemoryMembershipStore, RequestContext,
};
use hikkoshi_shared::models::{
    account::{Account, NewAccount},
    household::{Household, NewHousehold},
    invite::Invite,
};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

fn new_account(email: &str) -> NewAccount {
    NewAccount {
        email: email.to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
        display_name: email.split('@').next().unwrap_or("someone").to_string(),
    }
}

async fn register(store: &MemoryMembershipStore, email: &str) -> Account {
    service::register_account(store, &new_account(email))
        .await
        .expect("register account")
}

/// Registers an owner and creates their household
async fn setup_household(store: &MemoryMembershipStore) -> (Account, Household) {
    let owner = register(store, "owner@example.com").await;
    let household = service::create_household(
        store,
        &RequestContext::new(owner.id),
        &NewHousehold {
            name: "Tanaka family move".to_string(),
            move_date: None,
        },
    )
    .await
    .expect("create household");

    (owner, household)
}

async fn issue_at(
    store: &MemoryMembershipStore,
    owner: &Account,
    household: &Household,
    now: DateTime<Utc>,
) -> IssuedInvite {
    service::issue_invite(
        store,
        &InvitePolicy::default(),
        &RequestContext::at(owner.id, now),
        household.id,
    )
    .await
    .expect("issue invite")
}

async fn reload(store: &MemoryMembershipStore, account: &Account) -> Account {
    store.find_account(account.id).await.unwrap().unwrap()
}

async fn stored_invite(store: &MemoryMembershipStore, issued: &IssuedInvite) -> Invite {
    store.invite(issued.invite.id).await.unwrap()
}

#[test]
fn test_validate_matches_definition_for_random_clocks() {
    let mut rng = rand::thread_rng();
    let issued_at = Utc::now();

    for _ in 0..1000 {
        let offset = Duration::seconds(rng.gen_range(-86_400..3 * 86_400));
        let used = rng.gen_bool(0.5);
        let now = issued_at + offset;

        let invite = Invite {
            id: Uuid::new_v4(),
            code_hash: "0".repeat(64),
            household_id: Uuid::new_v4(),
            issued_by: Uuid::new_v4(),
            created_at: issued_at,
            expires_at: InvitePolicy::default().expires_at(issued_at).unwrap(),
            used,
            used_by: None,
            used_at: None,
        };

        let status = validate(&invite, now);
        assert_eq!(
            status == InviteStatus::Valid,
            now < invite.expires_at && !used,
            "offset {offset}, used {used}"
        );
    }
}

#[tokio::test]
async fn test_redeem_binds_unbound_account_and_consumes_invite() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let guest = register(&store, "guest@example.com").await;
    let now = Utc::now();
    let issued = issue_at(&store, &owner, &household, now).await;

    let outcome = service::redeem_invite(
        &store,
        &RequestContext::at(guest.id, now + Duration::minutes(5)),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, RedeemOutcome::Joined(ref h) if h.id == household.id));
    assert_eq!(reload(&store, &guest).await.household_id, Some(household.id));

    let invite = stored_invite(&store, &issued).await;
    assert!(invite.used);
    assert_eq!(invite.used_by, Some(guest.id));
    assert_eq!(invite.used_at, Some(now + Duration::minutes(5)));
}

#[tokio::test]
async fn test_second_redemption_never_double_grants() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let first = register(&store, "first@example.com").await;
    let second = register(&store, "second@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let code = issued.code.to_string();

    service::redeem_invite(&store, &RequestContext::new(first.id), &code)
        .await
        .unwrap();

    // Same account again: nothing changes
    let again = service::redeem_invite(&store, &RequestContext::new(first.id), &code)
        .await
        .unwrap();
    assert!(matches!(again, RedeemOutcome::AlreadyMember(_)));

    // Different account: rejected, stays unbound
    let err = service::redeem_invite(&store, &RequestContext::new(second.id), &code)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyUsed));
    assert_eq!(reload(&store, &second).await.household_id, None);

    assert_eq!(store.list_members(household.id).await.unwrap().len(), 2);
    assert_eq!(stored_invite(&store, &issued).await.used_by, Some(first.id));
}

#[tokio::test]
async fn test_member_redeeming_fresh_invite_is_noop() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;

    let outcome = service::redeem_invite(
        &store,
        &RequestContext::new(owner.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    assert_eq!(outcome, RedeemOutcome::AlreadyMember(household.clone()));
    assert!(!stored_invite(&store, &issued).await.used);
}

#[tokio::test]
async fn test_member_noop_takes_precedence_over_expiry() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let issued_at = Utc::now();
    let issued = issue_at(&store, &owner, &household, issued_at).await;

    let outcome = service::redeem_invite(
        &store,
        &RequestContext::at(owner.id, issued_at + Duration::days(3)),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, RedeemOutcome::AlreadyMember(_)));
}

#[tokio::test]
async fn test_invite_expires_after_24_hours() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let guest = register(&store, "late@example.com").await;
    let issued_at = Utc::now();
    let issued = issue_at(&store, &owner, &household, issued_at).await;

    assert_eq!(issued.invite.expires_at, issued_at + Duration::hours(24));

    let err = service::redeem_invite(
        &store,
        &RequestContext::at(guest.id, issued_at + Duration::hours(24) + Duration::minutes(1)),
        &issued.code.to_string(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MembershipError::Expired));
    assert!(!stored_invite(&store, &issued).await.used);
    assert_eq!(reload(&store, &guest).await.household_id, None);
}

#[tokio::test]
async fn test_expired_reported_before_used() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let first = register(&store, "first@example.com").await;
    let second = register(&store, "second@example.com").await;
    let issued_at = Utc::now();
    let issued = issue_at(&store, &owner, &household, issued_at).await;
    let code = issued.code.to_string();

    service::redeem_invite(&store, &RequestContext::at(first.id, issued_at), &code)
        .await
        .unwrap();

    let err = service::redeem_invite(
        &store,
        &RequestContext::at(second.id, issued_at + Duration::hours(30)),
        &code,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MembershipError::Expired));
}

#[tokio::test]
async fn test_signup_with_invite_then_other_account_is_rejected() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let code = issued.code.to_string();

    let (b, joined) = service::signup_with_invite(
        &store,
        &code,
        &new_account("b@example.com"),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(b.household_id, Some(household.id));
    assert_eq!(joined.id, household.id);
    let invite = stored_invite(&store, &issued).await;
    assert!(invite.used);
    assert_eq!(invite.used_by, Some(b.id));

    let c = register(&store, "c@example.com").await;
    let err = service::redeem_invite(&store, &RequestContext::new(c.id), &code)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyUsed));
    assert_eq!(reload(&store, &c).await.household_id, None);
}

#[tokio::test]
async fn test_signup_with_taken_email_leaves_invite_unused() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;

    let err = service::signup_with_invite(
        &store,
        &issued.code.to_string(),
        &new_account("OWNER@example.com"),
        Utc::now(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MembershipError::EmailTaken));
    assert!(!stored_invite(&store, &issued).await.used);
}

#[tokio::test]
async fn test_only_owner_can_issue() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let member = register(&store, "member@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    service::redeem_invite(
        &store,
        &RequestContext::new(member.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    let policy = InvitePolicy::default();

    let err = service::issue_invite(&store, &policy, &RequestContext::new(member.id), household.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));

    let err = service::issue_invite(&store, &policy, &RequestContext::new(owner.id), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));
}

#[tokio::test]
async fn test_malformed_code_never_reaches_store() {
    let store = MemoryMembershipStore::new();
    let guest = register(&store, "guest@example.com").await;

    for raw in ["", "abc", "not-a-uuid-at-all-not-a-uuid-at-all!", "12345678123456781234567812345678"] {
        let err = service::redeem_invite(&store, &RequestContext::new(guest.id), raw)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Malformed), "{raw:?}");

        let err = service::inspect_invite(&store, raw, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Malformed), "{raw:?}");
    }

    assert_eq!(store.invite_lookups(), 0);
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let store = MemoryMembershipStore::new();
    let guest = register(&store, "guest@example.com").await;

    let err = service::redeem_invite(
        &store,
        &RequestContext::new(guest.id),
        "2f1c3b9e-8a47-4d2b-9c1e-5b7a6d4e3f20",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MembershipError::NotFound));
    assert_eq!(store.invite_lookups(), 1);
}

#[tokio::test]
async fn test_account_bound_elsewhere_is_rejected() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;

    let other_owner = register(&store, "other@example.com").await;
    service::create_household(
        &store,
        &RequestContext::new(other_owner.id),
        &NewHousehold {
            name: "Suzuki move".to_string(),
            move_date: None,
        },
    )
    .await
    .unwrap();

    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let err = service::redeem_invite(
        &store,
        &RequestContext::new(other_owner.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, MembershipError::AlreadyInHousehold));
    assert!(!stored_invite(&store, &issued).await.used);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_have_one_winner() {
    let store = Arc::new(MemoryMembershipStore::new());
    let (owner, household) = setup_household(&store).await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let code = issued.code.to_string();

    let mut guests = Vec::new();
    for i in 0..16 {
        guests.push(register(&store, &format!("guest{i}@example.com")).await);
    }

    let handles: Vec<_> = guests
        .iter()
        .map(|guest| {
            let store = Arc::clone(&store);
            let code = code.clone();
            let ctx = RequestContext::new(guest.id);
            tokio::spawn(async move { service::redeem_invite(store.as_ref(), &ctx, &code).await })
        })
        .collect();

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(RedeemOutcome::Joined(_)) => joined += 1,
            Err(MembershipError::AlreadyUsed) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(joined, 1);
    assert_eq!(store.list_members(household.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_bind_leaves_invite_unused() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let guest = register(&store, "guest@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let code = issued.code.to_string();

    store.inject_bind_failure();
    let err = service::redeem_invite(&store, &RequestContext::new(guest.id), &code)
        .await
        .unwrap_err();

    assert!(matches!(err, MembershipError::Store(_)));
    assert!(!stored_invite(&store, &issued).await.used);
    assert_eq!(reload(&store, &guest).await.household_id, None);

    // The same invite still works once the store recovers
    let outcome = service::redeem_invite(&store, &RequestContext::new(guest.id), &code)
        .await
        .unwrap();
    assert!(matches!(outcome, RedeemOutcome::Joined(_)));
}

#[tokio::test]
async fn test_remove_member() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let member = register(&store, "member@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    service::redeem_invite(
        &store,
        &RequestContext::new(member.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    // Members cannot remove each other or the owner
    let err = service::remove_member(&store, &RequestContext::new(member.id), household.id, owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));

    // Owner cannot remove themself
    let err = service::remove_member(&store, &RequestContext::new(owner.id), household.id, owner.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::CannotRemoveOwner));

    service::remove_member(&store, &RequestContext::new(owner.id), household.id, member.id)
        .await
        .unwrap();
    assert_eq!(reload(&store, &member).await.household_id, None);

    // Already gone
    let err = service::remove_member(&store, &RequestContext::new(owner.id), household.id, member.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::NotInHousehold));
}

#[tokio::test]
async fn test_leave_household() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let member = register(&store, "member@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    service::redeem_invite(
        &store,
        &RequestContext::new(member.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    let err = service::leave_household(&store, &RequestContext::new(owner.id))
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::CannotRemoveOwner));

    let left = service::leave_household(&store, &RequestContext::new(member.id))
        .await
        .unwrap();
    assert_eq!(left.id, household.id);

    let err = service::leave_household(&store, &RequestContext::new(member.id))
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::NotInHousehold));

    // A detached account can join again with a new invite
    let again = issue_at(&store, &owner, &household, Utc::now()).await;
    let outcome = service::redeem_invite(
        &store,
        &RequestContext::new(member.id),
        &again.code.to_string(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, RedeemOutcome::Joined(_)));
}

#[tokio::test]
async fn test_create_household_requires_unbound_account() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;

    assert_eq!(household.owner_id, owner.id);
    assert_eq!(reload(&store, &owner).await.household_id, Some(household.id));

    let err = service::create_household(
        &store,
        &RequestContext::new(owner.id),
        &NewHousehold {
            name: "Second move".to_string(),
            move_date: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MembershipError::AlreadyInHousehold));
}

#[tokio::test]
async fn test_inspect_invite_is_read_only() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let guest = register(&store, "guest@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    let code = issued.code.to_string();
    let now = Utc::now();

    let anonymous = service::inspect_invite(&store, &code, None, now).await.unwrap();
    assert_eq!(anonymous.action, InviteAction::Signup);
    assert_eq!(anonymous.household_name, "Tanaka family move");

    let logged_in = service::inspect_invite(&store, &code, Some(guest.id), now)
        .await
        .unwrap();
    assert_eq!(logged_in.action, InviteAction::Join);

    let member = service::inspect_invite(&store, &code, Some(owner.id), now)
        .await
        .unwrap();
    assert_eq!(member.action, InviteAction::AlreadyMember);

    assert!(!stored_invite(&store, &issued).await.used);
    assert_eq!(reload(&store, &guest).await.household_id, None);

    let err = service::inspect_invite(&store, &code, None, now + Duration::hours(25))
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::Expired));
}

#[tokio::test]
async fn test_members_and_move_date() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let member = register(&store, "member@example.com").await;
    let outsider = register(&store, "outsider@example.com").await;
    let issued = issue_at(&store, &owner, &household, Utc::now()).await;
    service::redeem_invite(
        &store,
        &RequestContext::new(member.id),
        &issued.code.to_string(),
    )
    .await
    .unwrap();

    let members = service::list_members(&store, &RequestContext::new(member.id), household.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = members.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![owner.id, member.id]);

    let err = service::list_members(&store, &RequestContext::new(outsider.id), household.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));

    let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 28);
    let updated = service::update_move_date(
        &store,
        &RequestContext::new(member.id),
        household.id,
        date,
    )
    .await
    .unwrap();
    assert_eq!(updated.move_date, date);
    assert_eq!(updated.last_updated_by, Some(member.id));

    let err = service::update_move_date(
        &store,
        &RequestContext::new(outsider.id),
        household.id,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));
}

#[tokio::test]
async fn test_list_invites_is_owner_only() {
    let store = MemoryMembershipStore::new();
    let (owner, household) = setup_household(&store).await;
    let t0 = Utc::now();
    let first = issue_at(&store, &owner, &household, t0).await;
    let second = issue_at(&store, &owner, &household, t0 + Duration::minutes(1)).await;

    let invites = service::list_invites(&store, &RequestContext::new(owner.id), household.id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = invites.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![second.invite.id, first.invite.id]);

    let stranger = register(&store, "stranger@example.com").await;
    let err = service::list_invites(&store, &RequestContext::new(stranger.id), household.id)
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::PermissionDenied));
}
