use crate::error::AccountsError;
use crate::types::{Email, Service, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// `user` row. Timestamp columns are aliased to fixed names when selected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbUser {
    pub id: String,
    pub username: Option<String>,
    pub deactivated: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbEmail {
    pub id: String,
    pub user_id: String,
    pub address: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbService {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub token: Option<String>,
    pub service_id: Option<String>,
    pub data: Option<String>,
}

impl DbUser {
    pub fn into_user(self, emails: Vec<DbEmail>) -> User {
        User {
            id: self.id,
            username: self.username,
            deactivated: self.deactivated,
            emails: emails.into_iter().map(Into::into).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<DbEmail> for Email {
    fn from(d: DbEmail) -> Self {
        Email {
            address: d.address,
            verified: d.verified,
        }
    }
}

impl TryFrom<DbService> for Service {
    type Error = AccountsError;

    fn try_from(d: DbService) -> Result<Self, Self::Error> {
        let data = d.data.as_deref().map(serde_json::from_str::<Value>).transpose()?;
        Ok(Service {
            id: d.id,
            name: d.name,
            token: d.token,
            service_id: d.service_id,
            data,
        })
    }
}
