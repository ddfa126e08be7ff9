//! Progress service - read side for profile and history views

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{TransactionQuery, XpTransaction};
use crate::progression::{level_for_xp, rank_for_xp, xp_to_next_level, xp_to_next_rank, Rank};
use crate::store::{CheckInStore, LedgerStore, UserStore};
use crate::streak::{StreakEvaluator, StreakSummary};
use crate::summary::{summarize, XpSummary};

/// Profile progress for display
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub user_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub rank: Rank,
    pub xp_to_next_level: u64,
    pub next_rank: Option<Rank>,
    pub xp_to_next_rank: Option<u64>,
    pub streak: StreakSummary,
}

/// Progress service
pub struct ProgressService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerStore>,
    streaks: StreakEvaluator,
}

impl ProgressService {
    pub fn new(
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerStore>,
        check_ins: Arc<dyn CheckInStore>,
    ) -> Self {
        Self {
            users,
            ledger,
            streaks: StreakEvaluator::new(check_ins),
        }
    }

    /// Progress as of today (UTC), `None` for unknown users
    pub fn progress(&self, user_id: &str) -> Result<Option<ProgressView>, StoreError> {
        self.progress_on(user_id, Utc::now().date_naive())
    }

    /// Progress as of `today`
    pub fn progress_on(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Option<ProgressView>, StoreError> {
        let Some(user) = self.users.get_user(user_id)? else {
            return Ok(None);
        };

        // Derived from total_xp rather than trusting the stored columns
        let total_xp = user.total_xp;
        let rank = rank_for_xp(total_xp);

        Ok(Some(ProgressView {
            user_id: user.user_id,
            total_xp,
            level: level_for_xp(total_xp),
            rank,
            xp_to_next_level: xp_to_next_level(total_xp),
            next_rank: rank.next(),
            xp_to_next_rank: xp_to_next_rank(total_xp),
            streak: self.streaks.summary_on(user_id, today)?,
        }))
    }

    /// Ledger entries for a user, newest first
    pub fn history(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<XpTransaction>, StoreError> {
        self.ledger.query_transactions(user_id, query)
    }

    /// Totals over the entries matching `query` (paging ignored)
    pub fn summary(
        &self,
        user_id: &str,
        query: &TransactionQuery,
    ) -> Result<XpSummary, StoreError> {
        let unpaged = TransactionQuery {
            limit: usize::MAX,
            offset: 0,
            ..query.clone()
        };
        let transactions = self.ledger.query_transactions(user_id, &unpaged)?;
        Ok(summarize(&transactions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activities;
    use crate::progression::GameState;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn setup() -> (ProgressService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.create_user("u1").unwrap();
        let service = ProgressService::new(store.clone(), store.clone(), store.clone());
        (service, store)
    }

    #[test]
    fn test_progress_view() {
        let (service, store) = setup();
        store.update_user("u1", 0, GameState::from_xp(450)).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 8, 10).unwrap();
        store.record_check_in("u1", today).unwrap();

        let view = service.progress_on("u1", today).unwrap().unwrap();
        assert_eq!(view.level, 5);
        assert_eq!(view.rank, Rank::Explorer);
        assert_eq!(view.xp_to_next_level, 50);
        assert_eq!(view.next_rank, Some(Rank::Contributor));
        assert_eq!(view.xp_to_next_rank, Some(50));
        assert_eq!(view.streak.current, 1);
        assert!(view.streak.checked_in_today);

        assert!(service.progress_on("nobody", today).unwrap().is_none());
    }

    #[test]
    fn test_summary_ignores_paging() {
        let (service, store) = setup();
        for _ in 0..3 {
            let tx = XpTransaction::new("u1", activities::LIKE_RECEIVED, 2, json!({}));
            store.append_transaction(&tx).unwrap();
        }

        let query = TransactionQuery {
            limit: 1,
            ..Default::default()
        };
        assert_eq!(service.history("u1", &query).unwrap().len(), 1);

        let summary = service.summary("u1", &query).unwrap();
        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.total_xp_earned, 6);
    }
}
