use crate::config::Config;
use crate::db::models::{DbEmail, DbService, DbUser};
use crate::db::options::StoreOptions;
use crate::db::schema::{sqlite_init, statements};
use crate::error::{AccountsError, AccountsResult};
use crate::types::{CreateUser, Service, User, UserWithServices};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

/// Service name of email verification tokens.
pub const EMAIL_SERVICE: &str = "email";
/// Service name eager-loaded by [`CredentialStore::find_user_by_id_with_password`].
pub const PASSWORD_SERVICE: &str = "password";
/// Service name of password reset tokens.
pub const RESET_PASSWORD_SERVICE: &str = "password.reset";

/// Open a pool for `cfg.database_url`, creating the file if needed.
pub async fn connect(cfg: &Config) -> AccountsResult<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(cfg.database_url.as_str())?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect_with(connect_opts)
        .await?;
    Ok(pool)
}

/// SQL touching the `user` table, rendered once for the configured timestamp columns.
#[derive(Debug)]
pub(crate) struct UserSql {
    select: String,
    insert: String,
    insert_with_id: String,
    set_username: String,
    pub(crate) set_deactivated: String,
}

impl UserSql {
    fn new(opts: &StoreOptions) -> Self {
        let created = &opts.timestamps.created_at;
        let updated = &opts.timestamps.updated_at;
        Self {
            select: format!(
                r#"SELECT u.id, u.username, u.deactivated,
                   u."{created}" AS created_at, u."{updated}" AS updated_at
                   FROM "user" u"#
            ),
            insert: format!(
                r#"INSERT INTO "user" (username, "{created}", "{updated}")
                   VALUES (?, ?, ?) RETURNING id"#
            ),
            insert_with_id: format!(
                r#"INSERT INTO "user" (id, username, "{created}", "{updated}")
                   VALUES (?, ?, ?, ?) RETURNING id"#
            ),
            set_username: format!(
                r#"UPDATE "user" SET username = ?, "{updated}" = ? WHERE id = ?"#
            ),
            set_deactivated: format!(
                r#"UPDATE "user" SET deactivated = ?, "{updated}" = ? WHERE id = ?"#
            ),
        }
    }
}

/// Relational storage behind the password flows: users, passwords, emails and
/// the per-user service rows holding verification and reset tokens.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    options: Arc<StoreOptions>,
    sql: Arc<UserSql>,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, options: StoreOptions) -> AccountsResult<Self> {
        options.validate()?;
        let sql = UserSql::new(&options);
        Ok(Self {
            pool,
            options: Arc::new(options),
            sql: Arc::new(sql),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub(crate) fn user_sql(&self) -> &UserSql {
        &self.sql
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> AccountsResult<()> {
        let ddl = sqlite_init(&self.options.timestamps);
        for stmt in statements(&ddl) {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Create a user with its password and, optionally, a lowercased unverified email.
    /// Returns the new user id.
    pub async fn create_user(&self, payload: CreateUser) -> AccountsResult<String> {
        let CreateUser {
            password,
            username,
            email,
        } = payload;
        let username = username.filter(|u| !u.is_empty());
        let email = email.filter(|e| !e.is_empty()).map(|e| e.to_lowercase());
        let now = self.options.now();

        let mut tx = self.pool.begin().await?;

        let id: String = match self.options.id_provider.as_ref() {
            Some(provider) => {
                sqlx::query_scalar(&self.sql.insert_with_id)
                    .bind(provider())
                    .bind(username.as_deref())
                    .bind(now)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query_scalar(&self.sql.insert)
                    .bind(username.as_deref())
                    .bind(now)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        sqlx::query("INSERT INTO user_password (user_id, hash) VALUES (?, ?)")
            .bind(&id)
            .bind(password)
            .execute(&mut *tx)
            .await?;

        if let Some(address) = email.as_deref() {
            sqlx::query("INSERT INTO user_email (user_id, address, verified) VALUES (?, ?, 0)")
                .bind(&id)
                .bind(address)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(user_id = %id, username = ?username, email = ?email, "user created");
        Ok(id)
    }

    pub async fn find_user_by_id(&self, user_id: &str) -> AccountsResult<Option<User>> {
        let sql = format!("{} WHERE u.id = ?", self.sql.select);
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_emails(row).await
    }

    /// Like [`find_user_by_id`](Self::find_user_by_id), with the user's
    /// `"password"` service rows loaded alongside.
    pub async fn find_user_by_id_with_password(
        &self,
        user_id: &str,
    ) -> AccountsResult<Option<UserWithServices>> {
        let Some(user) = self.find_user_by_id(user_id).await? else {
            return Ok(None);
        };
        let rows = sqlx::query_as::<_, DbService>(
            r#"SELECT id, user_id, name, token, service_id, data
               FROM user_service WHERE user_id = ? AND name = ? ORDER BY rowid"#,
        )
        .bind(user_id)
        .bind(PASSWORD_SERVICE)
        .fetch_all(&self.pool)
        .await?;
        let services = rows
            .into_iter()
            .map(Service::try_from)
            .collect::<AccountsResult<Vec<_>>>()?;
        Ok(Some(UserWithServices { user, services }))
    }

    /// Exact match on the stored address. The argument is not lowercased.
    pub async fn find_user_by_email(&self, address: &str) -> AccountsResult<Option<User>> {
        let sql = format!(
            "{} WHERE u.id = (SELECT user_id FROM user_email WHERE address = ? ORDER BY rowid LIMIT 1)",
            self.sql.select
        );
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        self.with_emails(row).await
    }

    pub async fn find_user_by_username(&self, username: &str) -> AccountsResult<Option<User>> {
        let collate = if self.options.case_sensitive_username {
            ""
        } else {
            " COLLATE NOCASE"
        };
        let sql = format!(
            "{} WHERE u.username = ?{collate} ORDER BY u.rowid LIMIT 1",
            self.sql.select
        );
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        self.with_emails(row).await
    }

    /// Returns `None` when the user has no password row.
    pub async fn find_password_hash(&self, user_id: &str) -> AccountsResult<Option<String>> {
        let hash = sqlx::query_scalar("SELECT hash FROM user_password WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    pub async fn find_user_by_email_verification_token(
        &self,
        token: &str,
    ) -> AccountsResult<Option<User>> {
        self.find_user_by_service_token(EMAIL_SERVICE, token).await
    }

    /// Matches any `"password.reset"` row carrying `token`.
    pub async fn find_user_by_reset_password_token(
        &self,
        token: &str,
    ) -> AccountsResult<Option<User>> {
        self.find_user_by_service_token(RESET_PASSWORD_SERVICE, token)
            .await
    }

    /// Add an email address (stored lowercased) to an existing user.
    pub async fn add_email(
        &self,
        user_id: &str,
        address: &str,
        verified: bool,
    ) -> AccountsResult<()> {
        let address = address.to_lowercase();
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        sqlx::query("INSERT INTO user_email (user_id, address, verified) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&address)
            .bind(verified)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(user_id, address = %address, verified, "email added");
        Ok(())
    }

    pub async fn remove_email(&self, user_id: &str, address: &str) -> AccountsResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        let res = sqlx::query("DELETE FROM user_email WHERE user_id = ? AND address = ?")
            .bind(user_id)
            .bind(address)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(email_not_found(user_id, address));
        }
        tx.commit().await?;
        info!(user_id, address, "email removed");
        Ok(())
    }

    pub async fn verify_email(&self, user_id: &str, address: &str) -> AccountsResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;
        let res =
            sqlx::query("UPDATE user_email SET verified = 1 WHERE user_id = ? AND address = ?")
                .bind(user_id)
                .bind(address)
                .execute(&mut *tx)
                .await?;
        if res.rows_affected() == 0 {
            return Err(email_not_found(user_id, address));
        }
        tx.commit().await?;
        info!(user_id, address, "email verified");
        Ok(())
    }

    /// Fails with `ConstraintViolation` when another user already holds `username`.
    pub async fn set_username(&self, user_id: &str, username: &str) -> AccountsResult<()> {
        let res = sqlx::query(&self.sql.set_username)
            .bind(username)
            .bind(self.options.now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AccountsError::not_found(format!("user {user_id}")));
        }
        info!(user_id, username, "username changed");
        Ok(())
    }

    /// Replace the stored hash. Fails with `NotFound` when the user has no password row.
    pub async fn set_password(&self, user_id: &str, hash: &str) -> AccountsResult<()> {
        let res = sqlx::query("UPDATE user_password SET hash = ? WHERE user_id = ?")
            .bind(hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AccountsError::not_found(format!(
                "password for user {user_id}"
            )));
        }
        info!(user_id, "password changed");
        Ok(())
    }

    /// Store a verification token for one of the user's emails. Each email
    /// keeps its own token; a later call for the same email replaces it.
    pub async fn add_email_verification_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()> {
        self.upsert_email_token(user_id, email, EMAIL_SERVICE, token)
            .await
    }

    /// Store a reset token tied to one of the user's emails. `NotFound` when
    /// the email does not belong to the user.
    pub async fn add_reset_password_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()> {
        self.upsert_email_token(user_id, email, RESET_PASSWORD_SERVICE, token)
            .await
    }

    pub async fn remove_all_reset_password_tokens(&self, user_id: &str) -> AccountsResult<()> {
        let res = sqlx::query("DELETE FROM user_service WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(RESET_PASSWORD_SERVICE)
            .execute(&self.pool)
            .await?;
        debug!(user_id, removed = res.rows_affected(), "reset password tokens removed");
        Ok(())
    }

    async fn upsert_email_token(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        token: &str,
    ) -> AccountsResult<()> {
        // Lookup and upsert must see the same email row.
        let mut tx = self.pool.begin().await?;
        let email_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM user_email WHERE user_id = ? AND address = ?")
                .bind(user_id)
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(email_id) = email_id else {
            return Err(email_not_found(user_id, email));
        };

        sqlx::query(
            r#"
            INSERT INTO user_service (user_id, name, token, service_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, name, service_id) DO UPDATE SET
                token = excluded.token
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(token)
        .bind(&email_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id, service = name, email_id = %email_id, "email token stored");
        Ok(())
    }

    async fn find_user_by_service_token(
        &self,
        name: &str,
        token: &str,
    ) -> AccountsResult<Option<User>> {
        let sql = format!(
            r#"{} WHERE EXISTS (
                   SELECT 1 FROM user_service s
                   WHERE s.user_id = u.id AND s.name = ? AND s.token = ?
               )
               ORDER BY u.rowid LIMIT 1"#,
            self.sql.select
        );
        let row = sqlx::query_as::<_, DbUser>(&sql)
            .bind(name)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        debug!(service = name, found = row.is_some(), "lookup by service token");
        self.with_emails(row).await
    }

    async fn with_emails(&self, row: Option<DbUser>) -> AccountsResult<Option<User>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let emails = sqlx::query_as::<_, DbEmail>(
            "SELECT id, user_id, address, verified FROM user_email WHERE user_id = ? ORDER BY rowid",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(row.into_user(emails)))
    }
}

/// `NotFound` unless a user with `user_id` exists.
pub(crate) async fn ensure_user(conn: &mut SqliteConnection, user_id: &str) -> AccountsResult<()> {
    let found: Option<i64> = sqlx::query_scalar(r#"SELECT 1 FROM "user" WHERE id = ?"#)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(AccountsError::not_found(format!("user {user_id}"))),
    }
}

fn email_not_found(user_id: &str, address: &str) -> AccountsError {
    AccountsError::not_found(format!("email {address} for user {user_id}"))
}
