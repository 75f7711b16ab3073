#![allow(dead_code)]

use accounts_sqlx::{CredentialStore, Database, StoreOptions, logging};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// One connection that never expires, so the in-memory database lives for the whole test.
pub async fn memory_pool() -> sqlx::SqlitePool {
    logging::init("debug");
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await
        .expect("failed to open in-memory sqlite")
}

pub async fn store_with(options: StoreOptions) -> CredentialStore {
    let store = CredentialStore::new(memory_pool().await, options).expect("valid store options");
    store.init_schema().await.expect("schema init failed");
    store
}

pub async fn store() -> CredentialStore {
    store_with(StoreOptions::default()).await
}

pub async fn database() -> Database {
    let db = Database::new(memory_pool().await, StoreOptions::default()).expect("valid options");
    db.credentials()
        .init_schema()
        .await
        .expect("schema init failed");
    db
}

pub async fn count(pool: &sqlx::SqlitePool, sql: &str, user_id: &str) -> i64 {
    sqlx::query_scalar(sql)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count query failed")
}
