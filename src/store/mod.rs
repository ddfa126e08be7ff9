//! Store traits for the collaborators the engine reads and writes
//!
//! ## Backends
//!
//! - [`MemoryStore`]: DashMap-backed, for tests and embedding
//! - [`crate::db::GameDb`]: SQLite via rusqlite
//!
//! Both implement all three traits so a single handle can be shared
//! between the award engine, the streak evaluator and the services.

pub mod memory;

pub use memory::MemoryStore;

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::models::{TransactionQuery, UserGameState, XpTransaction};
use crate::progression::GameState;

/// Per-user game state record
pub trait UserStore: Send + Sync {
    /// Create a user at zero XP. Fails with `AlreadyExists` if present.
    fn create_user(&self, user_id: &str) -> Result<UserGameState, StoreError>;

    /// Read a user, `None` if unknown
    fn get_user(&self, user_id: &str) -> Result<Option<UserGameState>, StoreError>;

    /// Compare-and-set the XP triple of a user
    ///
    /// Writes only if the stored version still equals `expected_version`,
    /// bumping the version on success. Returns `Ok(false)` when another
    /// writer got there first and `NotFound` if the user is gone.
    fn update_user(
        &self,
        user_id: &str,
        expected_version: u64,
        state: GameState,
    ) -> Result<bool, StoreError>;
}

/// Append-only XP ledger
pub trait LedgerStore: Send + Sync {
    /// Append one entry
    fn append_transaction(&self, entry: &XpTransaction) -> Result<(), StoreError>;

    /// Entries of one user matching `query`, newest first
    fn query_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<XpTransaction>, StoreError>;
}

/// Daily check-in history, unique on `(user_id, date)`
pub trait CheckInStore: Send + Sync {
    /// Record a check-in. Returns `false` if one already exists for that date.
    fn record_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError>;

    /// Undo a check-in whose reward could not be committed.
    /// Returns `false` if there was nothing to remove.
    fn remove_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError>;

    /// Check-in dates of a user, most recent first
    fn list_check_in_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>, StoreError>;
}
