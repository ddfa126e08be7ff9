//! XP service - awards with event emission
//!
//! Wraps the award engine for engagement and admin callers. Every committed
//! award emits `XpAwarded`, plus one `LevelUp` and one `RankUp` event when
//! the corresponding flag is set.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{AwardRequest, AwardResult, XpEngine};
use crate::error::{AwardError, StoreError};
use crate::models::{activities, UserGameState};
use crate::store::UserStore;
use crate::config::RewardConfig;

use super::events::{EventBus, GameEvent};

/// XP service for business logic
pub struct XpService {
    engine: XpEngine,
    users: Arc<dyn UserStore>,
    rewards: RewardConfig,
    events: Arc<EventBus>,
}

impl XpService {
    /// Create a new XP service
    pub fn new(
        engine: XpEngine,
        users: Arc<dyn UserStore>,
        rewards: RewardConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self { engine, users, rewards, events }
    }

    /// Register a user at zero XP
    pub fn create_user(&self, user_id: &str) -> Result<UserGameState, StoreError> {
        self.users.create_user(user_id)
    }

    /// Apply an award and emit its events
    pub fn award(&self, request: AwardRequest) -> Result<AwardResult, AwardError> {
        let activity = request.activity_tag();
        let amount = request.amount;
        let result = self.engine.award(request)?;

        self.emit_award_events(&activity, amount, &result);
        Ok(result)
    }

    /// Award `amount` XP with a free-form reason
    pub fn award_xp(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        details: Value,
    ) -> Result<AwardResult, AwardError> {
        self.award(AwardRequest::new(user_id, amount, reason).with_details(details))
    }

    /// Award the configured XP for an engagement activity
    ///
    /// Returns `Ok(None)` when no reward is configured for `activity`.
    pub fn award_for_activity(
        &self,
        user_id: &str,
        activity: &str,
        details: Value,
    ) -> Result<Option<AwardResult>, AwardError> {
        let Some(amount) = self.rewards.xp_for(activity) else {
            debug!(user_id = %user_id, activity = %activity, "No reward configured for activity");
            return Ok(None);
        };

        self.award(
            AwardRequest::new(user_id, amount, activity)
                .with_activity(activity)
                .with_details(details),
        )
        .map(Some)
    }

    /// Administrative correction; `amount` may be negative
    pub fn admin_adjust(
        &self,
        user_id: &str,
        amount: i64,
        admin_id: &str,
        reason: &str,
    ) -> Result<AwardResult, AwardError> {
        self.award(
            AwardRequest::new(user_id, amount, reason)
                .with_activity(activities::ADMIN_ADJUSTMENT)
                .with_actor(admin_id),
        )
    }

    fn emit_award_events(&self, activity: &str, amount: i64, result: &AwardResult) {
        self.events.emit(GameEvent::XpAwarded {
            user_id: result.user_id.clone(),
            activity: activity.to_string(),
            amount,
            new_xp: result.new_xp,
        });

        if result.leveled_up {
            self.events.emit(GameEvent::LevelUp {
                user_id: result.user_id.clone(),
                old_level: result.old_level,
                new_level: result.new_level,
            });
        }

        if result.ranked_up {
            if result.transition().is_demotion() {
                info!(
                    user_id = %result.user_id,
                    old_rank = %result.old_rank,
                    new_rank = %result.new_rank,
                    "Rank lowered"
                );
            }
            self.events.emit(GameEvent::RankUp {
                user_id: result.user_id.clone(),
                old_rank: result.old_rank,
                new_rank: result.new_rank,
            });
        }
    }
}
