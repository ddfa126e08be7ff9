//! SQLite database for user game state, the XP ledger and check-ins
//!
//! ## Tables
//!
//! - `user_game_state` - XP, level, rank and CAS version per user
//! - `xp_transactions` - append-only ledger
//! - `check_ins` - one row per (user_id, date)
//!
//! Timestamps are stored as RFC 3339 TEXT, dates as `YYYY-MM-DD`.

pub mod schema;
pub mod users;
pub mod transactions;
pub mod check_ins;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{TransactionQuery, UserGameState, XpTransaction};
use crate::progression::GameState;
use crate::store::{CheckInStore, LedgerStore, UserStore};

/// Database file name inside the storage directory
pub const DB_FILE_NAME: &str = "gamification.db";

/// SQLite-backed store
pub struct GameDb {
    conn: Mutex<Connection>,
}

impl GameDb {
    /// Open or create the database in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(storage_dir)?;
        let db_path = storage_dir.join(DB_FILE_NAME);
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| StoreError::Database(format!("Failed to open SQLite: {}", e)))?;

        // WAL lets readers proceed while an award is being written
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
        )
            .map_err(|e| StoreError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(schema::init_schema)
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, StoreError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<i64, StoreError> {
                let sql = format!("SELECT COUNT(*) FROM {}", table);
                Ok(conn.query_row(&sql, [], |row| row.get(0))?)
            };
            let user_count = count("user_game_state")?;
            let transaction_count = count("xp_transactions")?;
            let check_in_count = count("check_ins")?;

            Ok(DbStats {
                user_count: user_count as u64,
                transaction_count: transaction_count as u64,
                check_in_count: check_in_count as u64,
            })
        })
    }
}

// ============================================================================
// Column Helpers
// ============================================================================

/// Format a timestamp for TEXT columns; fixed width so TEXT order is time order
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Database(format!("Invalid date '{}': {}", raw, e)))
}

/// SQLite integers are signed; values past i64::MAX saturate
pub(crate) fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub user_count: u64,
    pub transaction_count: u64,
    pub check_in_count: u64,
}

impl UserStore for GameDb {
    fn create_user(&self, user_id: &str) -> Result<UserGameState, StoreError> {
        self.with_conn(|conn| users::create_user(conn, user_id))
    }

    fn get_user(&self, user_id: &str) -> Result<Option<UserGameState>, StoreError> {
        self.with_conn(|conn| users::get_user(conn, user_id))
    }

    fn update_user(
        &self,
        user_id: &str,
        expected_version: u64,
        state: GameState,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| users::update_user(conn, user_id, expected_version, state))
    }
}

impl LedgerStore for GameDb {
    fn append_transaction(&self, entry: &XpTransaction) -> Result<(), StoreError> {
        self.with_conn(|conn| transactions::append_transaction(conn, entry))
    }

    fn query_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<XpTransaction>, StoreError> {
        self.with_conn(|conn| transactions::query_transactions(conn, user_id, query))
    }
}

impl CheckInStore for GameDb {
    fn record_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        self.with_conn(|conn| check_ins::record_check_in(conn, user_id, date))
    }

    fn remove_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        self.with_conn(|conn| check_ins::remove_check_in(conn, user_id, date))
    }

    fn list_check_in_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>, StoreError> {
        self.with_conn(|conn| check_ins::list_check_in_dates(conn, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_on_disk_and_reopen() {
        let temp = TempDir::new().unwrap();

        {
            let db = GameDb::open(temp.path()).unwrap();
            db.create_user("u1").unwrap();
            assert!(db.update_user("u1", 0, GameState::from_xp(320)).unwrap());
        }

        let db = GameDb::open(temp.path()).unwrap();
        let user = db.get_user("u1").unwrap().expect("persisted user");
        assert_eq!(user.total_xp, 320);
        assert_eq!(user.level, 4);
        assert_eq!(user.version, 1);
    }

    #[test]
    fn test_stats() {
        let db = GameDb::open_in_memory().unwrap();
        db.create_user("u1").unwrap();
        db.create_user("u2").unwrap();
        db.record_check_in("u1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.transaction_count, 0);
        assert_eq!(stats.check_in_count, 1);
    }
}
