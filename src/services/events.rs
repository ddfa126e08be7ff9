//! Event system for game state changes
//!
//! Services emit a `GameEvent` after each committed change. Emitting never
//! blocks and never fails; with no subscribers the event is dropped.
//!
//! The notification dispatcher is one such subscriber: it runs on its own
//! task and forwards level-up, rank-up and streak-milestone events to a
//! `NotificationSink`, discarding any sink error.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::notify::{NotificationKind, NotificationSink};
use crate::progression::Rank;

/// Events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    XpAwarded {
        user_id: String,
        activity: String,
        amount: i64,
        new_xp: u64,
    },
    LevelUp {
        user_id: String,
        old_level: u32,
        new_level: u32,
    },
    /// Any rank change, including a demotion after a correction
    RankUp {
        user_id: String,
        old_rank: Rank,
        new_rank: Rank,
    },
    CheckedIn {
        user_id: String,
        date: NaiveDate,
        streak: u32,
    },
    StreakMilestone {
        user_id: String,
        days: u32,
        bonus_xp: i64,
    },
}

impl GameEvent {
    /// Notification to deliver for this event, if any
    pub fn notification(&self) -> Option<(&str, NotificationKind, Value)> {
        match self {
            GameEvent::LevelUp { user_id, old_level, new_level } => Some((
                user_id.as_str(),
                NotificationKind::LevelUp,
                json!({ "oldLevel": old_level, "newLevel": new_level }),
            )),
            GameEvent::RankUp { user_id, old_rank, new_rank } => Some((
                user_id.as_str(),
                NotificationKind::RankUp,
                json!({ "oldRank": old_rank.name(), "newRank": new_rank.name() }),
            )),
            GameEvent::StreakMilestone { user_id, days, bonus_xp } => Some((
                user_id.as_str(),
                NotificationKind::StreakMilestone,
                json!({ "days": days, "bonusXp": bonus_xp }),
            )),
            GameEvent::XpAwarded { .. } | GameEvent::CheckedIn { .. } => None,
        }
    }
}

/// Event bus for broadcasting game events
pub struct EventBus {
    sender: broadcast::Sender<GameEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: GameEvent) {
        trace!(event = ?event, "Emitting game event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the task that forwards notifications to `sink`
///
/// Subscribes before returning, so events emitted after this call are
/// delivered. The task ends when the bus is dropped.
pub fn spawn_notification_dispatcher(
    event_bus: &EventBus,
    sink: Arc<dyn NotificationSink>,
) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some((user_id, kind, payload)) = event.notification() else {
                        continue;
                    };
                    if let Err(e) = sink.notify(user_id, kind, payload).await {
                        debug!(
                            user_id = %user_id,
                            kind = kind.as_str(),
                            error = %e,
                            "Notification dropped"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Notification dispatcher lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping notification dispatcher");
                    break;
                }
            }
        }
    })
}
