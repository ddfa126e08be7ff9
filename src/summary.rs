//! Aggregation over ledger entries for history views

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::XpTransaction;

/// Per-activity totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityTotal {
    pub activity: String,
    pub xp_earned: i64,
    pub count: u64,
}

/// Aggregated ledger statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XpSummary {
    /// Sum of raw deltas, before any zero clamping
    pub total_xp_earned: i64,
    pub transaction_count: u64,
    /// Sorted by activity tag
    pub by_activity: Vec<ActivityTotal>,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

/// Summarize a set of ledger entries (any order)
pub fn summarize(transactions: &[XpTransaction]) -> XpSummary {
    let mut by_activity: BTreeMap<&str, (i64, u64)> = BTreeMap::new();
    for tx in transactions {
        let entry = by_activity.entry(tx.activity.as_str()).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(tx.xp_earned);
        entry.1 += 1;
    }

    XpSummary {
        total_xp_earned: transactions
            .iter()
            .fold(0i64, |sum, tx| sum.saturating_add(tx.xp_earned)),
        transaction_count: transactions.len() as u64,
        by_activity: by_activity
            .into_iter()
            .map(|(activity, (xp_earned, count))| ActivityTotal {
                activity: activity.to_string(),
                xp_earned,
                count,
            })
            .collect(),
        first_at: transactions.iter().map(|tx| tx.timestamp).min(),
        last_at: transactions.iter().map(|tx| tx.timestamp).max(),
    }
}
