use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::config::{Config, Timestamps};
use crate::error::AccountsError;

/// Produces the id of a newly created user.
pub type IdProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Produces the stored timestamp value, from the given date or from "now".
pub type DateProvider = Arc<dyn Fn(Option<DateTime<Utc>>) -> i64 + Send + Sync>;

/// Epoch milliseconds of `date`, or of the current time.
pub fn default_date_provider(date: Option<DateTime<Utc>>) -> i64 {
    date.unwrap_or_else(Utc::now).timestamp_millis()
}

/// Construction-time options of the credential store.
#[derive(Clone)]
pub struct StoreOptions {
    pub timestamps: Timestamps,
    pub id_provider: Option<IdProvider>,
    pub date_provider: DateProvider,
    pub case_sensitive_username: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timestamps: Timestamps::default(),
            id_provider: None,
            date_provider: Arc::new(default_date_provider),
            case_sensitive_username: true,
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("timestamps", &self.timestamps)
            .field("id_provider", &self.id_provider.as_ref().map(|_| "<fn>"))
            .field("case_sensitive_username", &self.case_sensitive_username)
            .finish_non_exhaustive()
    }
}

impl From<&Config> for StoreOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            timestamps: cfg.timestamps.clone(),
            case_sensitive_username: cfg.case_sensitive_username,
            ..Default::default()
        }
    }
}

impl StoreOptions {
    pub fn with_id_provider(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_provider = Some(Arc::new(f));
        self
    }

    pub fn with_date_provider(
        mut self,
        f: impl Fn(Option<DateTime<Utc>>) -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.date_provider = Arc::new(f);
        self
    }

    pub fn with_timestamps(
        mut self,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        self.timestamps = Timestamps {
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        };
        self
    }

    pub fn case_sensitive_username(mut self, yes: bool) -> Self {
        self.case_sensitive_username = yes;
        self
    }

    /// Timestamp column names are spliced into SQL, so only plain identifiers are accepted.
    pub fn validate(&self) -> Result<(), AccountsError> {
        for name in [&self.timestamps.created_at, &self.timestamps.updated_at] {
            if !is_identifier(name) {
                return Err(AccountsError::InvalidOption(format!(
                    "timestamp column `{name}` is not a plain identifier"
                )));
            }
        }
        if self.timestamps.created_at == self.timestamps.updated_at {
            return Err(AccountsError::InvalidOption(
                "created and updated timestamp columns must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn now(&self) -> i64 {
        (self.date_provider)(None)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
