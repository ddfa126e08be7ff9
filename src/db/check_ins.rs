//! Daily check-in records

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};

use super::{format_date, format_timestamp, parse_date};
use crate::error::StoreError;

/// Record a check-in; `false` if the user already checked in on `date`
pub fn record_check_in(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
) -> Result<bool, StoreError> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO check_ins (user_id, date, created_at) VALUES (?, ?, ?)",
            params![user_id, format_date(date), format_timestamp(&Utc::now())],
        )
        .map_err(|e| StoreError::Database(format!("Insert failed: {}", e)))?;

    Ok(inserted == 1)
}

/// Delete a check-in row; `false` if none existed
pub fn remove_check_in(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
) -> Result<bool, StoreError> {
    let deleted = conn
        .execute(
            "DELETE FROM check_ins WHERE user_id = ? AND date = ?",
            params![user_id, format_date(date)],
        )
        .map_err(|e| StoreError::Database(format!("Delete failed: {}", e)))?;

    Ok(deleted == 1)
}

/// Check-in dates for a user, most recent first
pub fn list_check_in_dates(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<NaiveDate>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT date FROM check_ins WHERE user_id = ? ORDER BY date DESC")
        .map_err(|e| StoreError::Database(format!("Prepare failed: {}", e)))?;

    let raw: Vec<String> = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    raw.iter().map(|d| parse_date(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    #[test]
    fn test_unique_per_day_and_descending() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        assert!(record_check_in(&conn, "u1", jan2).unwrap());
        assert!(record_check_in(&conn, "u1", jan1).unwrap());
        assert!(!record_check_in(&conn, "u1", jan1).unwrap());
        assert!(record_check_in(&conn, "u2", jan1).unwrap());

        assert_eq!(list_check_in_dates(&conn, "u1").unwrap(), vec![jan2, jan1]);
        assert!(list_check_in_dates(&conn, "nobody").unwrap().is_empty());
    }

    #[test]
    fn test_remove_check_in() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        record_check_in(&conn, "u1", jan1).unwrap();

        assert!(remove_check_in(&conn, "u1", jan1).unwrap());
        assert!(!remove_check_in(&conn, "u1", jan1).unwrap());
        assert!(list_check_in_dates(&conn, "u1").unwrap().is_empty());
        // The day can be recorded again after removal
        assert!(record_check_in(&conn, "u1", jan1).unwrap());
    }
}
