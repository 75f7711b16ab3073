use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client connection details attached to a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInformations {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Session shape of the account contract. This adapter never produces one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub valid: bool,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub extra: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}
