//! In-memory store backed by DashMap
//!
//! Compare-and-set holds the shard write lock for the duration of the
//! version check and write, so concurrent updates to one user serialize.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{CheckInStore, LedgerStore, UserStore};
use crate::error::StoreError;
use crate::models::{TransactionQuery, UserGameState, XpTransaction};
use crate::progression::GameState;

/// Users, ledger and check-ins held in memory
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserGameState>,
    ledger: DashMap<String, Vec<XpTransaction>>,
    check_ins: DashMap<String, BTreeSet<NaiveDate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries across all users
    pub fn transaction_count(&self) -> usize {
        self.ledger.iter().map(|entry| entry.value().len()).sum()
    }
}

impl UserStore for MemoryStore {
    fn create_user(&self, user_id: &str) -> Result<UserGameState, StoreError> {
        match self.users.entry(user_id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(user_id.to_string())),
            Entry::Vacant(slot) => {
                let user = UserGameState::new(user_id);
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    fn get_user(&self, user_id: &str) -> Result<Option<UserGameState>, StoreError> {
        Ok(self.users.get(user_id).map(|user| user.clone()))
    }

    fn update_user(
        &self,
        user_id: &str,
        expected_version: u64,
        state: GameState,
    ) -> Result<bool, StoreError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;

        if user.version != expected_version {
            return Ok(false);
        }

        *user = user.with_state(state);
        Ok(true)
    }
}

impl LedgerStore for MemoryStore {
    fn append_transaction(&self, entry: &XpTransaction) -> Result<(), StoreError> {
        self.ledger
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn query_transactions(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<XpTransaction>, StoreError> {
        let Some(entries) = self.ledger.get(user_id) else {
            return Ok(vec![]);
        };

        let mut matching: Vec<XpTransaction> = entries
            .iter()
            .rev()
            .filter(|tx| query.matches(tx))
            .cloned()
            .collect();
        // Appends are chronological; a stable sort keeps insertion order on ties
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

impl CheckInStore for MemoryStore {
    fn record_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self
            .check_ins
            .entry(user_id.to_string())
            .or_default()
            .insert(date))
    }

    fn remove_check_in(&self, user_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self
            .check_ins
            .get_mut(user_id)
            .map(|mut dates| dates.remove(&date))
            .unwrap_or(false))
    }

    fn list_check_in_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>, StoreError> {
        Ok(self
            .check_ins
            .get(user_id)
            .map(|dates| dates.iter().rev().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activities;
    use serde_json::json;

    #[test]
    fn test_create_and_get_user() {
        let store = MemoryStore::new();
        store.create_user("u1").unwrap();

        let user = store.get_user("u1").unwrap().expect("user exists");
        assert_eq!(user.total_xp, 0);
        assert!(store.get_user("nobody").unwrap().is_none());
        assert!(matches!(
            store.create_user("u1"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_update_user_compare_and_set() {
        let store = MemoryStore::new();
        store.create_user("u1").unwrap();

        assert!(store.update_user("u1", 0, GameState::from_xp(150)).unwrap());
        // Stale version is rejected
        assert!(!store.update_user("u1", 0, GameState::from_xp(999)).unwrap());

        let user = store.get_user("u1").unwrap().unwrap();
        assert_eq!(user.total_xp, 150);
        assert_eq!(user.version, 1);

        assert!(matches!(
            store.update_user("ghost", 0, GameState::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_ledger_newest_first_with_paging() {
        let store = MemoryStore::new();
        for amount in 1..=5 {
            let tx = XpTransaction::new("u1", activities::LIKE_RECEIVED, amount, json!({}));
            store.append_transaction(&tx).unwrap();
        }

        let page = store
            .query_transactions(
                "u1",
                &TransactionQuery {
                    limit: 2,
                    offset: 1,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].xp_earned, 4);
        assert_eq!(page[1].xp_earned, 3);
        assert_eq!(store.transaction_count(), 5);
        assert!(store.query_transactions("u2", &TransactionQuery::default()).unwrap().is_empty());
    }

    #[test]
    fn test_check_ins_unique_and_descending() {
        let store = MemoryStore::new();
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        assert!(store.record_check_in("u1", d1).unwrap());
        assert!(store.record_check_in("u1", d2).unwrap());
        assert!(!store.record_check_in("u1", d2).unwrap());

        assert_eq!(store.list_check_in_dates("u1").unwrap(), vec![d2, d1]);

        assert!(store.remove_check_in("u1", d2).unwrap());
        assert!(!store.remove_check_in("u1", d2).unwrap());
        assert!(!store.remove_check_in("nobody", d1).unwrap());
        assert_eq!(store.list_check_in_dates("u1").unwrap(), vec![d1]);
    }
}
