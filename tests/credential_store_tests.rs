mod common;

use accounts_sqlx::StoreOptions;
use accounts_sqlx::types::CreateUser;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

const RESET_ROWS: &str =
    "SELECT COUNT(*) FROM user_service WHERE user_id = ? AND name = 'password.reset'";

fn alice() -> CreateUser {
    CreateUser::new("hash-1")
        .with_username("alice")
        .with_email("Alice@Example.COM")
}

#[tokio::test]
async fn create_user_round_trips_username_and_lowercased_email() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.expect("create");

    let user = store
        .find_user_by_id(&id)
        .await
        .expect("lookup")
        .expect("user exists");
    assert_eq!(user.id, id);
    assert_eq!(user.username.as_deref(), Some("alice"));
    assert!(!user.deactivated);
    assert_eq!(user.emails.len(), 1);
    assert_eq!(user.emails[0].address, "alice@example.com");
    assert!(!user.emails[0].verified);
    assert_eq!(
        store.find_password_hash(&id).await.expect("hash").as_deref(),
        Some("hash-1")
    );
}

#[tokio::test]
async fn create_user_without_username_or_email() {
    let store = common::store().await;
    let id = store
        .create_user(CreateUser {
            password: "h".into(),
            username: Some(String::new()),
            email: None,
        })
        .await
        .expect("create");

    let user = store.find_user_by_id(&id).await.unwrap().unwrap();
    assert_eq!(user.username, None);
    assert!(user.emails.is_empty());
    assert!(!id.is_empty());
}

#[tokio::test]
async fn email_lookup_only_normalizes_on_write() {
    let store = common::store().await;
    let id = store
        .create_user(CreateUser::new("h").with_email("Foo@Bar.COM"))
        .await
        .unwrap();

    let found = store.find_user_by_email("foo@bar.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(id));
    assert!(store.find_user_by_email("Foo@Bar.COM").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected_and_rolled_back() {
    let store = common::store().await;
    let first = store.create_user(alice()).await.unwrap();

    let err = store
        .create_user(
            CreateUser::new("hash-2")
                .with_username("alice")
                .with_email("other@example.com"),
        )
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation(), "got {err:?}");

    let user = store.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(user.id, first);
    assert_eq!(user.emails[0].address, "alice@example.com");
    assert!(
        store
            .find_user_by_email("other@example.com")
            .await
            .unwrap()
            .is_none()
    );
    let users: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let store = common::store().await;
    store.create_user(alice()).await.unwrap();
    let err = store
        .create_user(CreateUser::new("h").with_email("ALICE@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn id_provider_supplies_user_ids() {
    let counter = Arc::new(AtomicUsize::new(0));
    let ids = counter.clone();
    let store = common::store_with(
        StoreOptions::default()
            .with_id_provider(move || format!("user-{}", ids.fetch_add(1, Ordering::SeqCst))),
    )
    .await;

    let a = store.create_user(CreateUser::new("h")).await.unwrap();
    let b = store.create_user(CreateUser::new("h")).await.unwrap();
    assert_eq!(a, "user-0");
    assert_eq!(b, "user-1");
    assert!(store.find_user_by_id("user-1").await.unwrap().is_some());
}

#[tokio::test]
async fn date_provider_stamps_creation_and_updates() {
    let clock = Arc::new(AtomicI64::new(1_000));
    let tick = clock.clone();
    let store = common::store_with(
        StoreOptions::default()
            .with_date_provider(move |_| tick.fetch_add(1_000, Ordering::SeqCst)),
    )
    .await;

    let id = store.create_user(alice()).await.unwrap();
    let created = store.find_user_by_id(&id).await.unwrap().unwrap();
    assert_eq!(created.created_at, 1_000);
    assert_eq!(created.updated_at, 1_000);

    store.set_username(&id, "alice2").await.unwrap();
    let updated = store.find_user_by_id(&id).await.unwrap().unwrap();
    assert_eq!(updated.created_at, 1_000);
    assert_eq!(updated.updated_at, 2_000);
}

#[tokio::test]
async fn custom_timestamp_columns() {
    let store = common::store_with(
        StoreOptions::default()
            .with_timestamps("createdAt", "updatedAt")
            .with_date_provider(|_| 42),
    )
    .await;
    let id = store.create_user(alice()).await.unwrap();

    let user = store.find_user_by_id(&id).await.unwrap().unwrap();
    assert_eq!(user.created_at, 42);
    let raw: i64 = sqlx::query_scalar(r#"SELECT "createdAt" FROM "user" WHERE id = ?"#)
        .bind(&id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(raw, 42);
}

#[tokio::test]
async fn username_lookup_case_sensitivity() {
    let sensitive = common::store().await;
    sensitive.create_user(alice()).await.unwrap();
    assert!(sensitive.find_user_by_username("Alice").await.unwrap().is_none());

    let insensitive =
        common::store_with(StoreOptions::default().case_sensitive_username(false)).await;
    let id = insensitive.create_user(alice()).await.unwrap();
    let found = insensitive.find_user_by_username("ALICE").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(id));
}

#[tokio::test]
async fn password_hash_lookup_and_replace() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    store.set_password(&id, "hash-2").await.unwrap();
    assert_eq!(
        store.find_password_hash(&id).await.unwrap().as_deref(),
        Some("hash-2")
    );
    assert!(store.find_password_hash("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn set_password_for_unknown_user_is_not_found() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    let err = store.set_password("nobody", "hash-x").await.unwrap_err();
    assert!(err.is_not_found());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_password WHERE hash = 'hash-x'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(
        store.find_password_hash(&id).await.unwrap().as_deref(),
        Some("hash-1")
    );
}

#[tokio::test]
async fn add_verify_and_remove_email() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    store.add_email(&id, "Second@Example.com", false).await.unwrap();
    let user = store.find_user_by_email("second@example.com").await.unwrap().unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.emails.len(), 2);

    store.verify_email(&id, "second@example.com").await.unwrap();
    let user = store.find_user_by_id(&id).await.unwrap().unwrap();
    let second = user
        .emails
        .iter()
        .find(|e| e.address == "second@example.com")
        .unwrap();
    assert!(second.verified);

    store.remove_email(&id, "second@example.com").await.unwrap();
    let user = store.find_user_by_id(&id).await.unwrap().unwrap();
    assert!(!user.has_email("second@example.com"));
    assert!(user.has_email("alice@example.com"));
}

#[tokio::test]
async fn email_mutations_report_missing_rows() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    assert!(store.add_email("nobody", "x@example.com", true).await.unwrap_err().is_not_found());
    assert!(store.remove_email("nobody", "alice@example.com").await.unwrap_err().is_not_found());
    assert!(store.remove_email(&id, "missing@example.com").await.unwrap_err().is_not_found());
    assert!(store.verify_email(&id, "missing@example.com").await.unwrap_err().is_not_found());
    assert!(store.verify_email("nobody", "alice@example.com").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn add_email_collision_is_a_constraint_violation() {
    let store = common::store().await;
    store.create_user(alice()).await.unwrap();
    let bob = store
        .create_user(CreateUser::new("h").with_username("bob"))
        .await
        .unwrap();

    let err = store.add_email(&bob, "alice@example.com", false).await.unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn set_username_conflicts_and_missing_user() {
    let store = common::store().await;
    store.create_user(alice()).await.unwrap();
    let bob = store
        .create_user(CreateUser::new("h").with_username("bob"))
        .await
        .unwrap();

    assert!(store.set_username(&bob, "alice").await.unwrap_err().is_constraint_violation());
    assert!(store.set_username("nobody", "carol").await.unwrap_err().is_not_found());

    store.set_username(&bob, "robert").await.unwrap();
    let found = store.find_user_by_username("robert").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(bob));
}

#[tokio::test]
async fn verification_tokens_are_isolated_per_email() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();
    store.add_email(&id, "work@example.com", false).await.unwrap();

    store
        .add_email_verification_token(&id, "alice@example.com", "token-a")
        .await
        .unwrap();
    store
        .add_email_verification_token(&id, "work@example.com", "token-b")
        .await
        .unwrap();

    let a = store.find_user_by_email_verification_token("token-a").await.unwrap();
    let b = store.find_user_by_email_verification_token("token-b").await.unwrap();
    assert_eq!(a.map(|u| u.id), Some(id.clone()));
    assert_eq!(b.map(|u| u.id), Some(id));
}

#[tokio::test]
async fn verification_token_is_replaced_for_the_same_email() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    store
        .add_email_verification_token(&id, "alice@example.com", "old")
        .await
        .unwrap();
    store
        .add_email_verification_token(&id, "alice@example.com", "new")
        .await
        .unwrap();

    assert!(store.find_user_by_email_verification_token("old").await.unwrap().is_none());
    assert!(store.find_user_by_email_verification_token("new").await.unwrap().is_some());
}

#[tokio::test]
async fn verification_token_requires_the_users_own_email() {
    let store = common::store().await;
    store.create_user(alice()).await.unwrap();
    let bob = store
        .create_user(CreateUser::new("h").with_username("bob"))
        .await
        .unwrap();

    let err = store
        .add_email_verification_token(&bob, "alice@example.com", "t")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.find_user_by_email_verification_token("t").await.unwrap().is_none());
}

#[tokio::test]
async fn reset_tokens_match_any_row() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();
    store.add_email(&id, "work@example.com", false).await.unwrap();

    store
        .add_reset_password_token(&id, "alice@example.com", "reset-a")
        .await
        .unwrap();
    store
        .add_reset_password_token(&id, "work@example.com", "reset-b")
        .await
        .unwrap();

    for token in ["reset-a", "reset-b"] {
        let found = store.find_user_by_reset_password_token(token).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(id.clone()), "token {token}");
    }
    // A user without reset rows never matches.
    let bob = store
        .create_user(CreateUser::new("h").with_username("bob"))
        .await
        .unwrap();
    let found = store.find_user_by_reset_password_token("unknown").await.unwrap();
    assert!(found.is_none());
    assert!(store.find_user_by_id(&bob).await.unwrap().is_some());
}

#[tokio::test]
async fn reset_token_for_foreign_email_fails_loud() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();

    let err = store
        .add_reset_password_token(&id, "missing@example.com", "t")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(common::count(store.pool(), RESET_ROWS, &id).await, 0);
}

#[tokio::test]
async fn removing_reset_tokens_is_idempotent() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();
    store
        .add_reset_password_token(&id, "alice@example.com", "reset")
        .await
        .unwrap();
    store
        .add_email_verification_token(&id, "alice@example.com", "verify")
        .await
        .unwrap();

    store.remove_all_reset_password_tokens(&id).await.unwrap();
    assert_eq!(common::count(store.pool(), RESET_ROWS, &id).await, 0);
    store.remove_all_reset_password_tokens(&id).await.unwrap();
    assert_eq!(common::count(store.pool(), RESET_ROWS, &id).await, 0);

    assert!(store.find_user_by_reset_password_token("reset").await.unwrap().is_none());
    assert!(store.find_user_by_email_verification_token("verify").await.unwrap().is_some());
}

#[tokio::test]
async fn removing_an_email_drops_its_tokens() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();
    store
        .add_email_verification_token(&id, "alice@example.com", "verify")
        .await
        .unwrap();

    store.remove_email(&id, "alice@example.com").await.unwrap();
    assert!(store.find_user_by_email_verification_token("verify").await.unwrap().is_none());
}

#[tokio::test]
async fn with_password_loads_only_password_services() {
    let store = common::store().await;
    let id = store.create_user(alice()).await.unwrap();
    store
        .add_email_verification_token(&id, "alice@example.com", "verify")
        .await
        .unwrap();
    sqlx::query("INSERT INTO user_service (user_id, name, token) VALUES (?, 'password', 'pw')")
        .bind(&id)
        .execute(store.pool())
        .await
        .unwrap();

    let found = store
        .find_user_by_id_with_password(&id)
        .await
        .unwrap()
        .expect("user exists");
    assert_eq!(found.user.id, id);
    assert_eq!(found.services.len(), 1);
    assert_eq!(found.services[0].name, "password");
    assert_eq!(found.services[0].token.as_deref(), Some("pw"));

    assert!(store.find_user_by_id_with_password("nobody").await.unwrap().is_none());
}
