//! XP ledger operations
//!
//! Rows are only ever inserted. There is no update or delete path.

use rusqlite::{params, Connection, Row};
use tracing::debug;

use super::{format_timestamp, parse_timestamp};
use crate::error::StoreError;
use crate::models::{TransactionQuery, XpTransaction};

struct TransactionRow {
    id: String,
    user_id: String,
    activity: String,
    xp_earned: i64,
    timestamp: String,
    details_json: String,
}

impl TransactionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            activity: row.get("activity")?,
            xp_earned: row.get("xp_earned")?,
            timestamp: row.get("timestamp")?,
            details_json: row.get("details_json")?,
        })
    }

    fn into_transaction(self) -> Result<XpTransaction, StoreError> {
        Ok(XpTransaction {
            id: self.id,
            user_id: self.user_id,
            activity: self.activity,
            xp_earned: self.xp_earned,
            timestamp: parse_timestamp(&self.timestamp)?,
            details: serde_json::from_str(&self.details_json)?,
        })
    }
}

/// Append a ledger entry
pub fn append_transaction(conn: &Connection, entry: &XpTransaction) -> Result<(), StoreError> {
    let details_json = serde_json::to_string(&entry.details)?;

    conn.execute(
        r#"
        INSERT INTO xp_transactions (id, user_id, activity, xp_earned, timestamp, details_json)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            entry.id,
            entry.user_id,
            entry.activity,
            entry.xp_earned,
            format_timestamp(&entry.timestamp),
            details_json,
        ],
    ).map_err(|e| StoreError::Database(format!("Insert failed: {}", e)))?;

    Ok(())
}

/// List ledger entries for a user, newest first
pub fn query_transactions(
    conn: &Connection,
    user_id: &str,
    query: &TransactionQuery,
) -> Result<Vec<XpTransaction>, StoreError> {
    let mut sql = String::from("SELECT * FROM xp_transactions WHERE user_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(ref activity) = query.activity {
        sql.push_str(" AND activity = ?");
        params.push(Box::new(activity.clone()));
    }

    if let Some(ref after) = query.after {
        sql.push_str(" AND timestamp >= ?");
        params.push(Box::new(format_timestamp(after)));
    }

    if let Some(ref before) = query.before {
        sql.push_str(" AND timestamp < ?");
        params.push(Box::new(format_timestamp(before)));
    }

    // rowid breaks ties between entries written in the same microsecond
    sql.push_str(" ORDER BY timestamp DESC, rowid DESC LIMIT ? OFFSET ?");
    params.push(Box::new(i64::try_from(query.limit).unwrap_or(i64::MAX)));
    params.push(Box::new(i64::try_from(query.offset).unwrap_or(i64::MAX)));

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StoreError::Database(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), TransactionRow::from_row)
        .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        let row = row_result
            .map_err(|e| StoreError::Database(format!("Row parse failed: {}", e)))?;
        results.push(row.into_transaction()?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::models::activities;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn entry_at(activity: &str, xp: i64, minutes_ago: i64) -> XpTransaction {
        let mut tx = XpTransaction::new("u1", activity, xp, json!({ "reason": activity }));
        tx.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        tx
    }

    #[test]
    fn test_append_and_query_round_trip() {
        let conn = setup();
        let tx = entry_at(activities::ADMIN_ADJUSTMENT, -1000, 0);
        append_transaction(&conn, &tx).unwrap();

        let rows = query_transactions(&conn, "u1", &TransactionQuery::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].xp_earned, -1000);
        assert_eq!(rows[0].details["reason"], "admin_adjustment");
        // Stored at microsecond precision
        assert_eq!(rows[0].timestamp.timestamp_micros(), tx.timestamp.timestamp_micros());
    }

    #[test]
    fn test_query_filters_and_order() {
        let conn = setup();
        append_transaction(&conn, &entry_at(activities::DAILY_CHECKIN, 10, 30)).unwrap();
        append_transaction(&conn, &entry_at(activities::LIKE_RECEIVED, 2, 20)).unwrap();
        append_transaction(&conn, &entry_at(activities::DAILY_CHECKIN, 10, 10)).unwrap();

        let all = query_transactions(&conn, "u1", &TransactionQuery::all()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].timestamp > all[1].timestamp);

        let checkins = query_transactions(&conn, "u1", &TransactionQuery {
            activity: Some(activities::DAILY_CHECKIN.into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(checkins.len(), 2);

        let recent = query_transactions(&conn, "u1", &TransactionQuery {
            after: Some(Utc::now() - Duration::minutes(25)),
            ..Default::default()
        }).unwrap();
        assert_eq!(recent.len(), 2);

        let older = query_transactions(&conn, "u1", &TransactionQuery {
            before: Some(Utc::now() - Duration::minutes(15)),
            limit: 1,
            ..Default::default()
        }).unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].activity, activities::LIKE_RECEIVED);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let conn = setup();
        let tx = entry_at(activities::LIKE_RECEIVED, 1, 0);
        append_transaction(&conn, &tx).unwrap();
        assert!(append_transaction(&conn, &tx).is_err());
    }
}
