//! SQL DDL for initializing the account storage.
//! SQLite-first design; can be adapted for other RDBMS.

use crate::config::Timestamps;

/// Default for every text primary key when the caller does not supply one.
pub const DEFAULT_ID_EXPR: &str = "lower(hex(randomblob(16)))";

/// Build the bootstrap schema for the given timestamp column names.
///
/// - ids are TEXT, filled by [`DEFAULT_ID_EXPR`] unless provided on insert
/// - `user.username` and `user_email.address` are UNIQUE
/// - `user_password.user_id` is UNIQUE (one credential per user)
/// - `user_service` is unique on `(user_id, name)` for simple services and on
///   `(user_id, name, service_id)` for rows tied to an email
/// - email-tied services cascade with their email row
///
/// Column names must already be validated identifiers.
pub fn sqlite_init(ts: &Timestamps) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "user" (
    id TEXT PRIMARY KEY NOT NULL DEFAULT ({id}),
    username TEXT NULL UNIQUE,
    deactivated INTEGER NOT NULL DEFAULT 0,
    "{created}" INTEGER NOT NULL,
    "{updated}" INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_email (
    id TEXT PRIMARY KEY NOT NULL DEFAULT ({id}),
    user_id TEXT NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    address TEXT NOT NULL UNIQUE,
    verified INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_user_email_user_id ON user_email(user_id);

CREATE TABLE IF NOT EXISTS user_password (
    id TEXT PRIMARY KEY NOT NULL DEFAULT ({id}),
    user_id TEXT NOT NULL UNIQUE REFERENCES "user"(id) ON DELETE CASCADE,
    hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_service (
    id TEXT PRIMARY KEY NOT NULL DEFAULT ({id}),
    user_id TEXT NOT NULL REFERENCES "user"(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    token TEXT NULL,
    service_id TEXT NULL REFERENCES user_email(id) ON DELETE CASCADE,
    data TEXT NULL, -- JSON payload written by set_service
    UNIQUE (user_id, name, service_id)
);

-- NULL service_id values never collide in the composite constraint above.
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_service_simple
    ON user_service(user_id, name) WHERE service_id IS NULL;

CREATE INDEX IF NOT EXISTS idx_user_service_token ON user_service(name, token);
"#,
        id = DEFAULT_ID_EXPR,
        created = ts.created_at,
        updated = ts.updated_at,
    )
}

/// Split a DDL script into individual statements (sqlx runs one per query).
pub fn statements(script: &str) -> impl Iterator<Item = &str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.lines().all(|l| l.trim_start().starts_with("--")))
}
