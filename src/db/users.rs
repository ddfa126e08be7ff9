//! User game state operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{format_timestamp, parse_timestamp, to_sql_int};
use crate::error::StoreError;
use crate::models::UserGameState;
use crate::progression::{GameState, Rank};

/// Raw row before rank and timestamp parsing
struct UserRow {
    user_id: String,
    total_xp: i64,
    level: i64,
    rank: String,
    version: i64,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            user_id: row.get("user_id")?,
            total_xp: row.get("total_xp")?,
            level: row.get("level")?,
            rank: row.get("rank")?,
            version: row.get("version")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_state(self) -> Result<UserGameState, StoreError> {
        let rank = Rank::from_name(&self.rank).ok_or_else(|| {
            StoreError::Database(format!("Unknown rank '{}' for {}", self.rank, self.user_id))
        })?;

        Ok(UserGameState {
            user_id: self.user_id,
            total_xp: self.total_xp.max(0) as u64,
            level: u32::try_from(self.level).unwrap_or(1),
            rank,
            version: self.version.max(0) as u64,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Insert a new user at zero XP
pub fn create_user(conn: &Connection, user_id: &str) -> Result<UserGameState, StoreError> {
    let user = UserGameState::new(user_id);

    let inserted = conn.execute(
        r#"
        INSERT OR IGNORE INTO user_game_state (user_id, total_xp, level, rank, version, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            user.user_id,
            to_sql_int(user.total_xp),
            user.level,
            user.rank.name(),
            to_sql_int(user.version),
            format_timestamp(&user.updated_at),
        ],
    ).map_err(|e| StoreError::Database(format!("Insert failed: {}", e)))?;

    if inserted == 0 {
        return Err(StoreError::AlreadyExists(user_id.to_string()));
    }

    debug!(user_id = %user_id, "Created user game state");
    Ok(user)
}

/// Get a user by ID
pub fn get_user(conn: &Connection, user_id: &str) -> Result<Option<UserGameState>, StoreError> {
    let row = conn
        .query_row(
            "SELECT * FROM user_game_state WHERE user_id = ?",
            [user_id],
            UserRow::from_row,
        )
        .optional()
        .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?;

    row.map(UserRow::into_state).transpose()
}

/// Compare-and-set the XP triple, bumping the version
pub fn update_user(
    conn: &Connection,
    user_id: &str,
    expected_version: u64,
    state: GameState,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        r#"
        UPDATE user_game_state
        SET total_xp = ?, level = ?, rank = ?, version = version + 1, updated_at = ?
        WHERE user_id = ? AND version = ?
        "#,
        params![
            to_sql_int(state.total_xp),
            state.level,
            state.rank.name(),
            format_timestamp(&Utc::now()),
            user_id,
            to_sql_int(expected_version),
        ],
    ).map_err(|e| StoreError::Database(format!("Update failed: {}", e)))?;

    if updated == 1 {
        return Ok(true);
    }

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM user_game_state WHERE user_id = ?", [user_id], |row| row.get(0))
        .optional()?;

    match exists {
        Some(_) => Ok(false),
        None => Err(StoreError::NotFound(user_id.to_string())),
    }
}
