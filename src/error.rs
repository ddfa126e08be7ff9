//! Error types for the gamification engine

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the user, ledger and check-in stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Concurrent update conflict on {user_id} after {attempts} attempts")]
    Conflict { user_id: String, attempts: u32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Failures surfaced to callers of an award
///
/// Only these two are actionable. Ledger and notification failures are
/// absorbed after the user state has been committed.
#[derive(Error, Debug)]
pub enum AwardError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Failed to persist game state: {0}")]
    Persistence(#[source] StoreError),
}

/// Failures of a daily check-in
#[derive(Error, Debug)]
pub enum CheckInError {
    #[error("Check-in date {date} is after today ({today})")]
    FutureDate { date: NaiveDate, today: NaiveDate },

    #[error(transparent)]
    Award(#[from] AwardError),
}

/// Ledger append failure after a committed state update (logged, never returned)
#[derive(Error, Debug)]
#[error("Ledger write failed for {user_id}: {source}")]
pub struct LedgerWriteError {
    pub user_id: String,
    #[source]
    pub source: StoreError,
}

/// Failure inside a notification sink (always swallowed)
#[derive(Error, Debug)]
#[error("Notification error: {0}")]
pub struct NotificationError(pub String);
