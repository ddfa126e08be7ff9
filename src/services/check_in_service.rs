//! Check-in service - daily check-in rewards and streak milestones
//!
//! The check-in record is the "already checked in today" guard: XP is only
//! awarded when the record for `(user_id, date)` is newly inserted. If the
//! daily award cannot be committed the record is removed again, so a retry
//! gets a fresh chance at the reward.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::RewardConfig;
use crate::engine::{AwardRequest, AwardResult};
use crate::error::{AwardError, CheckInError};
use crate::models::activities;
use crate::store::{CheckInStore, UserStore};
use crate::streak::{streak_from_dates, StreakEvaluator};

use super::events::{EventBus, GameEvent};
use super::xp_service::XpService;

/// Result of a check-in attempt
#[derive(Debug, Clone, Serialize)]
pub struct CheckInOutcome {
    pub user_id: String,
    pub date: NaiveDate,
    /// True if the user had already checked in on `date`; nothing was awarded
    pub already_checked_in: bool,
    /// Current streak as of the day the check-in was made
    pub streak: u32,
    /// Daily check-in award
    pub award: Option<AwardResult>,
    /// Streak milestone bonuses newly reached by this check-in
    pub bonuses: Vec<AwardResult>,
}

/// Check-in service for business logic
pub struct CheckInService {
    users: Arc<dyn UserStore>,
    check_ins: Arc<dyn CheckInStore>,
    streaks: StreakEvaluator,
    xp: Arc<XpService>,
    rewards: RewardConfig,
    events: Arc<EventBus>,
}

impl CheckInService {
    /// Create a new check-in service
    pub fn new(
        users: Arc<dyn UserStore>,
        check_ins: Arc<dyn CheckInStore>,
        xp: Arc<XpService>,
        rewards: RewardConfig,
        events: Arc<EventBus>,
    ) -> Self {
        let streaks = StreakEvaluator::new(check_ins.clone());
        Self {
            users,
            check_ins,
            streaks,
            xp,
            rewards,
            events,
        }
    }

    /// Check in for today (UTC)
    pub fn check_in(&self, user_id: &str) -> Result<CheckInOutcome, CheckInError> {
        let today = Utc::now().date_naive();
        self.check_in_on(user_id, today, today)
    }

    /// Check in for `date`, as seen on `today`
    ///
    /// `date` may be an earlier day (backfill) but never a later one.
    /// Streaks and milestones are evaluated as of `today`, so a backfill
    /// that closes a gap pays the milestones the joined run newly reaches.
    pub fn check_in_on(
        &self,
        user_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<CheckInOutcome, CheckInError> {
        if date > today {
            return Err(CheckInError::FutureDate { date, today });
        }

        // Unknown users must not leave a check-in behind
        if self
            .users
            .get_user(user_id)
            .map_err(AwardError::Persistence)?
            .is_none()
        {
            return Err(AwardError::UserNotFound(user_id.to_string()).into());
        }

        let before = self
            .check_ins
            .list_check_in_dates(user_id)
            .map_err(AwardError::Persistence)?;

        let inserted = self
            .check_ins
            .record_check_in(user_id, date)
            .map_err(AwardError::Persistence)?;

        if !inserted {
            debug!(user_id = %user_id, %date, "Already checked in");
            return Ok(CheckInOutcome {
                user_id: user_id.to_string(),
                date,
                already_checked_in: true,
                streak: streak_from_dates(&before, today),
                award: None,
                bonuses: vec![],
            });
        }

        let award = match self.award_daily(user_id, date) {
            Ok(award) => award,
            Err(e) => {
                self.release_check_in(user_id, date);
                return Err(e.into());
            }
        };

        let streak = match self.streaks.compute_streak_on(user_id, today) {
            Ok(streak) => streak,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Streak unavailable after check-in");
                streak_from_dates(&before, today)
            }
        };

        self.events.emit(GameEvent::CheckedIn {
            user_id: user_id.to_string(),
            date,
            streak,
        });

        // Milestones up to the longer of the runs that existed before this
        // check-in were paid when those runs reached them
        let paid_through =
            streak_from_dates(&before, today).max(run_ending_on(&before, date.pred_opt()));

        let mut bonuses = vec![];
        for milestone in self.rewards.milestones_reached(paid_through, streak) {
            info!(
                user_id = %user_id,
                days = milestone.days,
                bonus_xp = milestone.bonus_xp,
                "Streak milestone reached"
            );
            let request = AwardRequest::new(
                user_id,
                milestone.bonus_xp,
                format!("{}-day streak", milestone.days),
            )
            .with_activity(activities::STREAK_BONUS)
            .with_details(json!({ "date": date.to_string(), "streak": streak }));

            match self.xp.award(request) {
                Ok(bonus) => {
                    self.events.emit(GameEvent::StreakMilestone {
                        user_id: user_id.to_string(),
                        days: milestone.days,
                        bonus_xp: milestone.bonus_xp,
                    });
                    bonuses.push(bonus);
                }
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        days = milestone.days,
                        error = %e,
                        "Streak bonus not awarded"
                    );
                }
            }
        }

        Ok(CheckInOutcome {
            user_id: user_id.to_string(),
            date,
            already_checked_in: false,
            streak,
            award: Some(award),
            bonuses,
        })
    }

    /// Current streak as of `today`
    pub fn streak_on(&self, user_id: &str, today: NaiveDate) -> Result<u32, AwardError> {
        self.streaks
            .compute_streak_on(user_id, today)
            .map_err(AwardError::Persistence)
    }

    fn award_daily(&self, user_id: &str, date: NaiveDate) -> Result<AwardResult, AwardError> {
        self.xp.award(
            AwardRequest::new(user_id, self.rewards.daily_checkin, activities::DAILY_CHECKIN)
                .with_activity(activities::DAILY_CHECKIN)
                .with_details(json!({ "date": date.to_string() })),
        )
    }

    /// Drop the check-in row of a failed award
    fn release_check_in(&self, user_id: &str, date: NaiveDate) {
        if let Err(e) = self.check_ins.remove_check_in(user_id, date) {
            warn!(
                user_id = %user_id,
                %date,
                error = %e,
                "Check-in kept without its daily award"
            );
        }
    }
}

/// Length of the run of check-ins ending exactly on `day`
fn run_ending_on(dates: &[NaiveDate], day: Option<NaiveDate>) -> u32 {
    match day {
        Some(day) if dates.contains(&day) => streak_from_dates(dates, day),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreakMilestone;
    use crate::engine::XpEngine;
    use crate::error::StoreError;
    use crate::models::UserGameState;
    use crate::progression::GameState;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// User store whose `update_user` fails on the listed call numbers
    struct FlakyUsers {
        inner: Arc<MemoryStore>,
        calls: AtomicU32,
        fail_on: Vec<u32>,
    }

    impl UserStore for FlakyUsers {
        fn create_user(&self, user_id: &str) -> Result<UserGameState, StoreError> {
            self.inner.create_user(user_id)
        }

        fn get_user(&self, user_id: &str) -> Result<Option<UserGameState>, StoreError> {
            self.inner.get_user(user_id)
        }

        fn update_user(
            &self,
            user_id: &str,
            expected_version: u64,
            state: GameState,
        ) -> Result<bool, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(StoreError::Database("locked".into()));
            }
            self.inner.update_user(user_id, expected_version, state)
        }
    }

    fn build(
        users: Arc<dyn UserStore>,
        store: Arc<MemoryStore>,
        rewards: RewardConfig,
    ) -> CheckInService {
        let events = Arc::new(EventBus::new());
        let xp = Arc::new(XpService::new(
            XpEngine::new(users.clone(), store.clone()),
            users.clone(),
            rewards.clone(),
            events.clone(),
        ));
        xp.create_user("u1").unwrap();
        CheckInService::new(users, store, xp, rewards, events)
    }

    fn setup(rewards: RewardConfig) -> (CheckInService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = build(store.clone(), store.clone(), rewards);
        (service, store)
    }

    fn setup_flaky(rewards: RewardConfig, fail_on: Vec<u32>) -> (CheckInService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let users = Arc::new(FlakyUsers {
            inner: store.clone(),
            calls: AtomicU32::new(0),
            fail_on,
        });
        let service = build(users, store.clone(), rewards);
        (service, store)
    }

    fn milestone_rewards(days: u32, bonus_xp: i64) -> RewardConfig {
        RewardConfig {
            daily_checkin: 10,
            streak_milestones: vec![StreakMilestone { days, bonus_xp }],
            ..Default::default()
        }
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, n).unwrap()
    }

    fn total_xp(store: &MemoryStore) -> u64 {
        store.get_user("u1").unwrap().unwrap().total_xp
    }

    #[test]
    fn test_daily_award_once_per_day() {
        let (service, store) = setup(RewardConfig::default());

        let first = service.check_in_on("u1", day(1), day(1)).unwrap();
        assert!(!first.already_checked_in);
        assert_eq!(first.streak, 1);
        assert_eq!(first.award.as_ref().map(|a| a.new_xp), Some(10));

        let again = service.check_in_on("u1", day(1), day(1)).unwrap();
        assert!(again.already_checked_in);
        assert_eq!(again.streak, 1);
        assert!(again.award.is_none());

        assert_eq!(total_xp(&store), 10);
        assert_eq!(store.transaction_count(), 1);
    }

    #[test]
    fn test_streak_milestone_bonus() {
        let (service, store) = setup(milestone_rewards(3, 70));

        service.check_in_on("u1", day(1), day(1)).unwrap();
        service.check_in_on("u1", day(2), day(2)).unwrap();
        let third = service.check_in_on("u1", day(3), day(3)).unwrap();

        assert_eq!(third.streak, 3);
        assert_eq!(third.bonuses.len(), 1);
        assert_eq!(third.bonuses[0].new_xp, 100);
        assert!(third.bonuses[0].leveled_up);
        assert_eq!(total_xp(&store), 100);

        let fourth = service.check_in_on("u1", day(4), day(4)).unwrap();
        assert!(fourth.bonuses.is_empty());
    }

    #[test]
    fn test_gap_resets_streak() {
        let (service, _store) = setup(RewardConfig::default());
        service.check_in_on("u1", day(1), day(1)).unwrap();
        service.check_in_on("u1", day(2), day(2)).unwrap();

        let after_gap = service.check_in_on("u1", day(5), day(5)).unwrap();
        assert_eq!(after_gap.streak, 1);
        assert_eq!(service.streak_on("u1", day(6)).unwrap(), 1);
        assert_eq!(service.streak_on("u1", day(7)).unwrap(), 0);
    }

    #[test]
    fn test_unknown_user_leaves_no_check_in() {
        let (service, store) = setup(RewardConfig::default());
        let err = service.check_in_on("ghost", day(1), day(1)).unwrap_err();
        assert!(matches!(err, CheckInError::Award(AwardError::UserNotFound(_))));
        assert!(store.list_check_in_dates("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_failed_daily_award_releases_check_in() {
        let (service, store) = setup_flaky(RewardConfig::default(), vec![1]);

        let err = service.check_in_on("u1", day(1), day(1)).unwrap_err();
        assert!(matches!(
            err,
            CheckInError::Award(AwardError::Persistence(StoreError::Database(_)))
        ));
        assert!(store.list_check_in_dates("u1").unwrap().is_empty());
        assert_eq!(total_xp(&store), 0);

        // Retrying the same day earns the reward
        let retry = service.check_in_on("u1", day(1), day(1)).unwrap();
        assert!(!retry.already_checked_in);
        assert_eq!(retry.award.map(|a| a.new_xp), Some(10));
        assert_eq!(total_xp(&store), 10);
        assert_eq!(store.list_check_in_dates("u1").unwrap(), vec![day(1)]);
    }

    #[test]
    fn test_failed_bonus_keeps_daily_award() {
        // Call 1 is the daily award, call 2 the milestone bonus
        let (service, store) = setup_flaky(milestone_rewards(1, 40), vec![2]);

        let outcome = service.check_in_on("u1", day(1), day(1)).unwrap();
        assert_eq!(outcome.award.map(|a| a.new_xp), Some(10));
        assert!(outcome.bonuses.is_empty());
        assert_eq!(total_xp(&store), 10);
        assert_eq!(store.list_check_in_dates("u1").unwrap(), vec![day(1)]);
    }

    #[test]
    fn test_future_date_rejected() {
        let (service, store) = setup(RewardConfig::default());
        let future = NaiveDate::from_ymd_opt(2099, 1, 1).unwrap();

        let err = service.check_in_on("u1", future, day(1)).unwrap_err();
        assert!(matches!(err, CheckInError::FutureDate { .. }));
        assert!(store.list_check_in_dates("u1").unwrap().is_empty());
        assert_eq!(total_xp(&store), 0);
    }

    #[test]
    fn test_backfill_closing_gap_pays_milestone() {
        let (service, store) = setup(milestone_rewards(5, 50));
        for n in [1, 2, 4, 5] {
            service.check_in_on("u1", day(n), day(n)).unwrap();
        }
        assert_eq!(total_xp(&store), 40);

        let backfill = service.check_in_on("u1", day(3), day(5)).unwrap();
        assert!(!backfill.already_checked_in);
        assert_eq!(backfill.streak, 5);
        assert_eq!(backfill.bonuses.len(), 1);
        assert_eq!(total_xp(&store), 100);
    }

    #[test]
    fn test_backfill_does_not_repay_earlier_run() {
        let (service, store) = setup(milestone_rewards(3, 30));
        for n in [1, 2, 3] {
            service.check_in_on("u1", day(n), day(n)).unwrap();
        }
        service.check_in_on("u1", day(5), day(5)).unwrap();
        service.check_in_on("u1", day(6), day(6)).unwrap();
        assert_eq!(total_xp(&store), 80);

        let backfill = service.check_in_on("u1", day(4), day(6)).unwrap();
        assert_eq!(backfill.streak, 6);
        assert!(backfill.bonuses.is_empty());
        assert_eq!(total_xp(&store), 90);
    }

    #[test]
    fn test_check_in_today() {
        let (service, store) = setup(RewardConfig::default());
        let outcome = service.check_in("u1").unwrap();
        assert_eq!(outcome.date, Utc::now().date_naive());
        assert_eq!(outcome.streak, 1);
        assert_eq!(total_xp(&store), 10);
    }
}
