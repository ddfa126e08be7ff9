//! Notification sinks
//!
//! Sinks receive level-up, rank-up and streak-milestone notices from the
//! dispatcher task. Their errors never reach the action that caused them.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::NotificationError;

/// Kind of user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LevelUp,
    RankUp,
    StreakMilestone,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LevelUp => "level_up",
            NotificationKind::RankUp => "rank_up",
            NotificationKind::StreakMilestone => "streak_milestone",
        }
    }
}

/// Destination for user notifications (push, in-app inbox, email...)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), NotificationError>;
}

/// Sink that only logs
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), NotificationError> {
        info!(user_id = %user_id, kind = kind.as_str(), payload = %payload, "Notification");
        Ok(())
    }
}
