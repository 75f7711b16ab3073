use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for registering a user with a password.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateUser {
    /// Already hashed secret. Stored as-is.
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CreateUser {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    pub address: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub deactivated: bool,
    pub emails: Vec<Email>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn has_email(&self, address: &str) -> bool {
        self.emails.iter().any(|e| e.address == address)
    }
}

/// A per-user named record used for tokens and linked third-party data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub token: Option<String>,
    /// Id of the email row this record is tied to, if any.
    pub service_id: Option<String>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserWithServices {
    #[serde(flatten)]
    pub user: User,
    pub services: Vec<Service>,
}
