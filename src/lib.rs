pub mod config;
pub mod contract;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;

pub use config::Config;
pub use contract::DatabaseInterface;
pub use db::{CredentialStore, Database, StoreOptions};
pub use error::{AccountsError, AccountsResult};
