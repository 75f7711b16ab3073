//! The account-persistence contract consumed by the authentication layer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AccountsResult;
use crate::types::{ConnectionInformations, CreateUser, Session, User};

/// Full persistence surface expected by the accounts server: user and
/// credential operations plus sessions.
#[async_trait]
pub trait DatabaseInterface: Send + Sync {
    // Users
    async fn create_user(&self, user: CreateUser) -> AccountsResult<String>;
    async fn find_user_by_id(&self, user_id: &str) -> AccountsResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AccountsResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AccountsResult<Option<User>>;
    async fn find_user_by_service_id(
        &self,
        service_name: &str,
        service_id: &str,
    ) -> AccountsResult<Option<User>>;
    async fn set_user_deactivated(&self, user_id: &str, deactivated: bool) -> AccountsResult<()>;

    // Services
    async fn set_service(&self, user_id: &str, service_name: &str, data: Value)
    -> AccountsResult<()>;
    async fn unset_service(&self, user_id: &str, service_name: &str) -> AccountsResult<()>;

    // Password service
    async fn find_password_hash(&self, user_id: &str) -> AccountsResult<Option<String>>;
    async fn find_user_by_reset_password_token(&self, token: &str)
    -> AccountsResult<Option<User>>;
    async fn find_user_by_email_verification_token(
        &self,
        token: &str,
    ) -> AccountsResult<Option<User>>;
    async fn set_password(&self, user_id: &str, new_password: &str) -> AccountsResult<()>;
    async fn set_username(&self, user_id: &str, new_username: &str) -> AccountsResult<()>;
    async fn add_email(&self, user_id: &str, new_email: &str, verified: bool)
    -> AccountsResult<()>;
    async fn remove_email(&self, user_id: &str, email: &str) -> AccountsResult<()>;
    async fn verify_email(&self, user_id: &str, email: &str) -> AccountsResult<()>;
    async fn add_email_verification_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()>;
    async fn add_reset_password_token(
        &self,
        user_id: &str,
        email: &str,
        token: &str,
    ) -> AccountsResult<()>;
    async fn remove_all_reset_password_tokens(&self, user_id: &str) -> AccountsResult<()>;

    // Magic link
    async fn find_user_by_login_token(&self, token: &str) -> AccountsResult<Option<User>>;
    async fn add_login_token(&self, user_id: &str, email: &str, token: &str)
    -> AccountsResult<()>;
    async fn remove_all_login_tokens(&self, user_id: &str) -> AccountsResult<()>;

    // Sessions
    async fn find_session_by_id(&self, session_id: &str) -> AccountsResult<Option<Session>>;
    async fn find_session_by_token(&self, token: &str) -> AccountsResult<Option<Session>>;
    async fn create_session(
        &self,
        user_id: &str,
        token: &str,
        connection: ConnectionInformations,
        extra_data: Option<Value>,
    ) -> AccountsResult<String>;
    async fn update_session(
        &self,
        session_id: &str,
        connection: ConnectionInformations,
        new_token: Option<&str>,
    ) -> AccountsResult<()>;
    async fn invalidate_session(&self, session_id: &str) -> AccountsResult<()>;
    async fn invalidate_all_sessions(
        &self,
        user_id: &str,
        excluded_session_ids: Option<&[String]>,
    ) -> AccountsResult<()>;
}
