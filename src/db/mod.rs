//! Database module: relational storage behind the account contract.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `options.rs`: id/date providers and timestamp column names
//! - `sqlite.rs`: the credential store (users, passwords, emails, tokens)
//! - `database.rs`: the contract facade

pub mod database;
pub mod models;
pub mod options;
pub mod schema;
pub mod sqlite;

pub use database::Database;
pub use models::{DbEmail, DbService, DbUser};
pub use options::{DateProvider, IdProvider, StoreOptions};
pub use schema::sqlite_init;
pub use sqlite::{CredentialStore, SqlitePool, connect};
