use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AccountsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Method not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Invalid store option: {0}")]
    InvalidOption(String),

    #[error("Database error: {0}")]
    Database(SqlxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl AccountsError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AccountsError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccountsError::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, AccountsError::ConstraintViolation(_))
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, AccountsError::NotImplemented(_))
    }
}

/// Unique violations and missing rows are lifted into the adapter taxonomy;
/// every other engine error passes through untouched.
impl From<SqlxError> for AccountsError {
    fn from(e: SqlxError) -> Self {
        match e {
            SqlxError::RowNotFound => AccountsError::NotFound("row".to_string()),
            SqlxError::Database(db_err) if db_err.is_unique_violation() => {
                AccountsError::ConstraintViolation(db_err.message().to_string())
            }
            other => AccountsError::Database(other),
        }
    }
}

impl From<figment::Error> for AccountsError {
    fn from(e: figment::Error) -> Self {
        AccountsError::Config(Box::new(e))
    }
}

pub type AccountsResult<T> = Result<T, AccountsError>;
