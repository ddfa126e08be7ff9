//! Domain records shared by the engine and the store backends
//!
//! - `UserGameState`: XP view onto a user record
//! - `XpTransaction`: one immutable ledger entry
//! - `TransactionQuery`: filters for ledger history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progression::{GameState, Rank};

// ============================================================================
// User State
// ============================================================================

/// Game state of a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGameState {
    pub user_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub rank: Rank,
    /// Bumped on every successful update, used for compare-and-set
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl UserGameState {
    /// Fresh user at zero XP
    pub fn new(user_id: impl Into<String>) -> Self {
        let state = GameState::default();
        Self {
            user_id: user_id.into(),
            total_xp: state.total_xp,
            level: state.level,
            rank: state.rank,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// The `(total_xp, level, rank)` triple as stored
    pub fn state(&self) -> GameState {
        GameState {
            total_xp: self.total_xp,
            level: self.level,
            rank: self.rank,
        }
    }

    /// Next version of this record carrying `state`
    pub fn with_state(&self, state: GameState) -> Self {
        Self {
            user_id: self.user_id.clone(),
            total_xp: state.total_xp,
            level: state.level,
            rank: state.rank,
            version: self.version + 1,
            updated_at: Utc::now(),
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Immutable record of one XP-changing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: String,
    pub user_id: String,
    pub activity: String,
    /// Raw signed delta requested, before zero clamping
    pub xp_earned: i64,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl XpTransaction {
    /// Create a new entry with a generated id and the current time
    pub fn new(
        user_id: impl Into<String>,
        activity: impl Into<String>,
        xp_earned: i64,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            activity: activity.into(),
            xp_earned,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Query parameters for listing ledger entries of one user
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionQuery {
    /// Filter by activity tag
    #[serde(default)]
    pub activity: Option<String>,
    /// Only entries at or after this time
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
    /// Only entries strictly before this time
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize { 100 }

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            activity: None,
            after: None,
            before: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl TransactionQuery {
    /// Everything for the user, no paging limit
    pub fn all() -> Self {
        Self {
            limit: usize::MAX,
            ..Default::default()
        }
    }

    /// True if `tx` passes the activity and time filters
    pub fn matches(&self, tx: &XpTransaction) -> bool {
        if let Some(ref activity) = self.activity {
            if &tx.activity != activity {
                return false;
            }
        }
        if let Some(after) = self.after {
            if tx.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if tx.timestamp >= before {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Activity Tags
// ============================================================================

/// Machine-readable activity tags recorded on ledger entries
pub mod activities {
    pub const DAILY_CHECKIN: &str = "daily_checkin";
    pub const STREAK_BONUS: &str = "streak_bonus";
    pub const LIKE_RECEIVED: &str = "like_received";
    pub const COMMENT_POSTED: &str = "comment_posted";
    pub const TEAM_JOINED: &str = "team_joined";
    pub const EVENT_ATTENDED: &str = "event_attended";
    pub const KYC_SUBMITTED: &str = "kyc_submitted";
    pub const ADMIN_ADJUSTMENT: &str = "admin_adjustment";

    /// All known activity tags
    pub const ALL: [&str; 8] = [
        DAILY_CHECKIN,
        STREAK_BONUS,
        LIKE_RECEIVED,
        COMMENT_POSTED,
        TEAM_JOINED,
        EVENT_ATTENDED,
        KYC_SUBMITTED,
        ADMIN_ADJUSTMENT,
    ];

    /// Check if an activity tag is known
    pub fn is_valid(activity: &str) -> bool {
        ALL.contains(&activity)
    }
}
