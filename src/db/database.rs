use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::contract::DatabaseInterface;
use crate::db::options::StoreOptions;
use crate::db::sqlite::{CredentialStore, SqlitePool, connect, ensure_user};
use crate::error::{AccountsError, AccountsResult};
use crate::types::{ConnectionInformations, CreateUser, Session, User};

/// [`DatabaseInterface`] over SQLite. Password flows go to the
/// [`CredentialStore`]; sessions and login tokens are not supported.
#[derive(Clone)]
pub struct Database {
    store: CredentialStore,
}

impl Database {
    pub fn new(pool: SqlitePool, options: StoreOptions) -> AccountsResult<Self> {
        Ok(Self {
            store: CredentialStore::new(pool, options)?,
        })
    }

    /// Open the configured database and make sure the schema exists.
    pub async fn connect(cfg: &Config) -> AccountsResult<Self> {
        let pool = connect(cfg).await?;
        let db = Self::new(pool, StoreOptions::from(cfg))?;
        db.store.init_schema().await?;
        info!(database_url = %cfg.database_url, "account database ready");
        Ok(db)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    fn not_implemented<T>(op: &'static str) -> AccountsResult<T> {
        warn!(operation = op, "unsupported account operation called");
        Err(AccountsError::NotImplemented(op))
    }
}

#[async_trait]
impl DatabaseInterface for Database {
    async fn create_user(&self, user: CreateUser) -> AccountsResult<String> {
        self.store.create_user(user).await
    }

    async fn find_user_by_id(&self, user_id: &str) -> AccountsResult<Option<User>> {
        self.store.find_user_by_id(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AccountsResult<Option<User>> {
        self.store.find_user_by_email(email).await
    }

    async fn find_user_by_username(&self, username: &str) -> AccountsResult<Option<User>> {
        self.store.find_user_by_username(username).await
    }

    /// `service_id` is the id of the service row itself.
    async fn find_user_by_service_id(
        &self,
        service_name: &str,
        service_id: &str,
    ) -> AccountsResult<Option<User>> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM user_service WHERE name = ? AND id = ?")
                .bind(service_name)
                .bind(service_id)
                .fetch_optional(self.store.pool())
                .await?;
        match owner {
            Some(user_id) => self.store.find_user_by_id(&user_id).await,
            None => Ok(None),
        }
    }

    async fn set_user_deactivated(&self, user_id: &str, deactivated: bool) -> AccountsResult<()> {
        let res = sqlx::query(&self.store.user_sql().set_deactivated)
            .bind(deactivated)
            .bind(self.store.options().now())
            .bind(user_id)
            .execute(self.store.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(AccountsError::not_found(format!("user {user_id}")));
        }
        info!(user_id, deactivated, "user deactivation changed");
        Ok(())
    }

    /// Stores `data` JSON-encoded. A second call for the same name is a
    /// `ConstraintViolation`; unset it first.
    async fn set_service(
        &self,
        user_id: &str,
        service_name: &str,
        data: Value,
    ) -> AccountsResult<()> {
        let payload = serde_json::to_string(&data)?;
        let mut tx = self.store.pool().begin().await?;
        ensure_user(&mut tx, user_id).await?;
        sqlx::query("INSERT INTO user_service (user_id, name, data) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(service_name)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(user_id, service = service_name, "service set");
        Ok(())
    }

    async fn unset_service(&self, user_id: &str, service_name: &str) -> AccountsResult<()> {
        let res = sqlx::query(
            "DELETE FROM user_service WHERE user_id = ? AND name = ? AND service_id IS NULL",
        )
        .bind(user_id)
        .bind(service_name)
        .execute(self.store.pool())
        .await?;
        if res.rows_affected() == 0 {
            return Err(AccountsError::not_found(format!(
                "service {service_name} for user {user_id}"
            )));
        }
        info!(user_id, service = service_name, "service unset");
        Ok(())
    }

    async fn find_password_hash(&self, user_id: &str) -> AccountsResult<Option<String>> {
        self.store.find_password_hash(user_id).await
    }

    async fn find_user_by_reset_password_token(
        &self,
        token: &str,
    ) -> AccountsResult<Option<User>> {
        self.store.find_user_by_reset_password_token(token).await
    }

    async fn find_user_by_email_verification_token(
        &self,
        token: &str,
    ) -> AccountsResult<Option<User>> {
        self.store.find_user_by_email_verification_token(token).await
    }

    async fn set_password(&self, user_id: &str, new_password: &str) -> AccountsResult<()> {
        self.store.set_password(user_id, new_password).await
    }

    async fn set_username(&self, user_id: &str, new_username: &str) -> AccountsResult<()> {
        self.store.set_username(user_id, new_username).await
    }

    async fn add_email(
        &self,
        user_id: &str,
        new_email: &str,
        verified: bool,
    ) -> AccountsResult<()> {
        self.store.add_email(user_id, new_email, verified).await
    }

    async fn remove_email(&self, user_id: &str, email: &str) -> AccountsResult<()> {
        self.store.remove_email(user_id, email).await
    }

    async fn verify_email(&self, user_id: &str, email: &str) -> AccountsResult<()> {
        self.store.verify_email(user_id, email).await
    }

    async fn add_email_verification_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()> {
        self.store
            .add_email_verification_token(user_id, email, token)
            .await
    }

    async fn add_reset_password_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()> {
        self.store
            .add_reset_password_token(user_id, email, token)
            .await
    }

    async fn remove_all_reset_password_tokens(&self, user_id: &str) -> AccountsResult<()> {
        self.store.remove_all_reset_password_tokens(user_id).await
    }

    async fn find_user_by_login_token(&self, _token: &str) -> AccountsResult<Option<User>> {
        Self::not_implemented("findUserByLoginToken")
    }

    async fn add_login_token(
        &self,
        _user_id: &str,
        _email: &str,
        _token: &str,
    ) -> AccountsResult<()> {
        Self::not_implemented("addLoginToken")
    }

    async fn remove_all_login_tokens(&self, _user_id: &str) -> AccountsResult<()> {
        Self::not_implemented("removeAllLoginTokens")
    }

    async fn find_session_by_id(&self, _session_id: &str) -> AccountsResult<Option<Session>> {
        Self::not_implemented("findSessionById")
    }

    async fn find_session_by_token(&self, _token: &str) -> AccountsResult<Option<Session>> {
        Self::not_implemented("findSessionByToken")
    }

    async fn create_session(
        &self,
        _user_id: &str,
        _token: &str,
        _connection: ConnectionInformations,
        _extra_data: Option<Value>,
    ) -> AccountsResult<String> {
        Self::not_implemented("createSession")
    }

    async fn update_session(
        &self,
        _session_id: &str,
        _connection: ConnectionInformations,
        _new_token: Option<&str>,
    ) -> AccountsResult<()> {
        Self::not_implemented("updateSession")
    }

    async fn invalidate_session(&self, _session_id: &str) -> AccountsResult<()> {
        Self::not_implemented("invalidateSession")
    }

    async fn invalidate_all_sessions(
        &self,
        _user_id: &str,
        _excluded_session_ids: Option<&[String]>,
    ) -> AccountsResult<()> {
        Self::not_implemented("invalidateAllSessions")
    }
}
