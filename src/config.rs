use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::AccountsError;

/// Column names used for the user timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Fallback filter for [`crate::logging::init`] when `RUST_LOG` is unset.
    pub loglevel: String,
    pub max_connections: u32,
    /// Compare usernames byte-for-byte on lookup. When false, lookups use `COLLATE NOCASE`.
    pub case_sensitive_username: bool,
    pub timestamps: Timestamps,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:accounts.db".to_string(),
            loglevel: "info".to_string(),
            max_connections: 5,
            case_sensitive_username: true,
            timestamps: Timestamps::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, `.env` and `ACCOUNTS_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `ACCOUNTS_TIMESTAMPS__CREATED_AT`.
    pub fn load() -> Result<Self, AccountsError> {
        dotenvy::dotenv().ok();
        Self::figment().extract().map_err(AccountsError::from)
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("ACCOUNTS_").split("__"))
    }
}
