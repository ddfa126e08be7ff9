//! Check-in streak evaluation
//!
//! Streaks are recomputed from the raw check-in history on every query.
//! Nothing streak-related is stored on the user record.
//!
//! A streak ends at today, or at yesterday if the user has not checked in
//! yet today, so an open day never resets a running streak.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::store::CheckInStore;

/// Current consecutive-day streak ending at `today` or the day before
pub fn streak_from_dates(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let anchor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|yesterday| days.contains(yesterday))
    };

    let mut streak = 0;
    let mut cursor = anchor;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

/// Longest run of consecutive days anywhere in the history
pub fn longest_streak(dates: &[NaiveDate]) -> u32 {
    let days: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(expected) if expected == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

/// Streak figures for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
    pub total_days: u32,
    pub checked_in_today: bool,
}

/// Computes streaks from a check-in store
pub struct StreakEvaluator {
    check_ins: Arc<dyn CheckInStore>,
}

impl StreakEvaluator {
    pub fn new(check_ins: Arc<dyn CheckInStore>) -> Self {
        Self { check_ins }
    }

    /// Current streak as of today (UTC)
    pub fn compute_streak(&self, user_id: &str) -> Result<u32, StoreError> {
        self.compute_streak_on(user_id, Utc::now().date_naive())
    }

    /// Current streak as of `today`
    pub fn compute_streak_on(&self, user_id: &str, today: NaiveDate) -> Result<u32, StoreError> {
        let dates = self.check_ins.list_check_in_dates(user_id)?;
        Ok(streak_from_dates(&dates, today))
    }

    /// Full streak summary as of `today`
    pub fn summary_on(&self, user_id: &str, today: NaiveDate) -> Result<StreakSummary, StoreError> {
        let dates = self.check_ins.list_check_in_dates(user_id)?;

        Ok(StreakSummary {
            current: streak_from_dates(&dates, today),
            longest: longest_streak(&dates),
            total_days: dates.len() as u32,
            checked_in_today: dates.contains(&today),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap() + chrono::Duration::days(offset)
    }

    #[test]
    fn test_consecutive_days_ending_today() {
        let dates = [day(0), day(-1), day(-2), day(-4)];
        assert_eq!(streak_from_dates(&dates, day(0)), 3);
    }

    #[test]
    fn test_no_recent_check_in_is_zero() {
        let dates = [day(-2), day(-3)];
        assert_eq!(streak_from_dates(&dates, day(0)), 0);
        assert_eq!(streak_from_dates(&[], day(0)), 0);
    }

    #[test]
    fn test_open_today_keeps_streak_from_yesterday() {
        let dates = [day(-1), day(-2)];
        assert_eq!(streak_from_dates(&dates, day(0)), 2);
    }

    #[test]
    fn test_order_of_input_does_not_matter() {
        let dates = [day(-2), day(0), day(-1)];
        assert_eq!(streak_from_dates(&dates, day(0)), 3);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = [
            today,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
        ];
        assert_eq!(streak_from_dates(&dates, today), 3);
    }

    #[test]
    fn test_longest_streak() {
        let dates = [day(0), day(-3), day(-4), day(-5), day(-9)];
        assert_eq!(longest_streak(&dates), 3);
        assert_eq!(longest_streak(&[]), 0);
    }

    #[test]
    fn test_evaluator_summary() {
        let store = Arc::new(MemoryStore::new());
        for offset in [-1, -2, -3, -6] {
            store.record_check_in("u1", day(offset)).unwrap();
        }
        let evaluator = StreakEvaluator::new(store);

        assert_eq!(evaluator.compute_streak_on("u1", day(0)).unwrap(), 3);
        let summary = evaluator.summary_on("u1", day(0)).unwrap();
        assert_eq!(
            summary,
            StreakSummary {
                current: 3,
                longest: 3,
                total_days: 4,
                checked_in_today: false,
            }
        );
        assert_eq!(evaluator.compute_streak_on("nobody", day(0)).unwrap(), 0);
    }

    #[test]
    fn test_compute_streak_uses_current_day() {
        let store = Arc::new(MemoryStore::new());
        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        store.record_check_in("u1", today).unwrap();
        store.record_check_in("u1", yesterday).unwrap();
        store.record_check_in("u1", today - chrono::Duration::days(3)).unwrap();

        let evaluator = StreakEvaluator::new(store);
        assert_eq!(evaluator.compute_streak("u1").unwrap(), 2);
        assert_eq!(evaluator.compute_streak("nobody").unwrap(), 0);
    }
}
