//! Service layer for the gamification engine
//!
//! Services sit between callers (request handlers, admin tools, the CLI)
//! and the engine/stores. Each service adds:
//! - Reward lookup from configuration
//! - Event emission for notifications
//! - Check-in guarding and streak bonuses
//!
//! ## Architecture
//!
//! ```text
//! Callers (thin)
//!     ↓
//! Service Layer (xp, check-in, progress)
//!     ↓                    ↘
//! XpEngine / StreakEvaluator  EventBus ──► notification dispatcher ──► NotificationSink
//!     ↓
//! Store traits (memory / SQLite)
//! ```

pub mod events;
pub mod notify;
pub mod xp_service;
pub mod check_in_service;
pub mod progress_service;

// Re-exports
pub use events::{spawn_notification_dispatcher, EventBus, GameEvent};
pub use notify::{LoggingNotificationSink, NotificationKind, NotificationSink};
pub use xp_service::XpService;
pub use check_in_service::{CheckInOutcome, CheckInService};
pub use progress_service::{ProgressService, ProgressView};

use std::sync::Arc;

use crate::config::Config;
use crate::engine::XpEngine;
use crate::store::{CheckInStore, LedgerStore, UserStore};

/// Service container for dependency injection
///
/// Holds all services over one shared store.
pub struct Services {
    pub xp: Arc<XpService>,
    pub check_in: Arc<CheckInService>,
    pub progress: Arc<ProgressService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services over a store implementing every store trait
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: UserStore + LedgerStore + CheckInStore + 'static,
    {
        let events = Arc::new(EventBus::with_capacity(config.notification_capacity));

        let engine = XpEngine::new(store.clone(), store.clone())
            .with_max_attempts(config.max_update_attempts);
        let xp = Arc::new(XpService::new(
            engine,
            store.clone(),
            config.rewards.clone(),
            events.clone(),
        ));

        Self {
            check_in: Arc::new(CheckInService::new(
                store.clone(),
                store.clone(),
                xp.clone(),
                config.rewards.clone(),
                events.clone(),
            )),
            progress: Arc::new(ProgressService::new(store.clone(), store.clone(), store)),
            xp,
            events,
        }
    }

    /// Start forwarding transition events to `sink` on a background task
    pub fn start_notifications(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> tokio::task::JoinHandle<()> {
        spawn_notification_dispatcher(&self.events, sink)
    }
}
