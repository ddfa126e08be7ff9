//! XP award engine
//!
//! Turns an `(user_id, amount, reason, details)` request into a committed
//! XP change plus a ledger entry.
//!
//! ## Award Pipeline
//!
//! ```text
//! read user ──► apply delta (floor 0) ──► compare-and-set user ──► append ledger
//!     ▲                                        │ version moved          │
//!     └────────────── retry ◄──────────────────┘                  best-effort
//! ```
//!
//! The user-state write is the critical path: its failure is returned and
//! nothing is written to the ledger. The ledger append happens only after
//! the state is committed, and a failure there is logged and absorbed.
//!
//! Awards are not idempotent. Callers must make sure one real-world action
//! produces at most one award, and must not blindly retry a call whose
//! outcome is unknown (e.g. after a timeout).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{AwardError, LedgerWriteError, StoreError};
use crate::models::{activities, UserGameState, XpTransaction};
use crate::progression::{detect_transition, GameState, Rank, Transition};
use crate::store::{LedgerStore, UserStore};

/// Default number of compare-and-set attempts per award
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

// ============================================================================
// Request / Result
// ============================================================================

/// A single XP award
#[derive(Debug, Clone, Deserialize)]
pub struct AwardRequest {
    pub user_id: String,
    /// Signed delta; negative for corrections
    pub amount: i64,
    /// Human-readable reason
    pub reason: String,
    /// Ledger activity tag. Derived from `reason` when absent.
    #[serde(default)]
    pub activity: Option<String>,
    /// Who triggered the award (admin id, system job)
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub details: Value,
}

impl AwardRequest {
    pub fn new(user_id: impl Into<String>, amount: i64, reason: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            activity: None,
            actor: None,
            details: Value::Null,
        }
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Ledger tag: explicit activity, else the reason if it is a known tag,
    /// else `admin_adjustment`
    pub fn activity_tag(&self) -> String {
        match self.activity {
            Some(ref activity) => activity.clone(),
            None if activities::is_valid(&self.reason) => self.reason.clone(),
            None => activities::ADMIN_ADJUSTMENT.to_string(),
        }
    }
}

/// Outcome of a committed award
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardResult {
    pub success: bool,
    pub user_id: String,
    pub old_xp: u64,
    pub new_xp: u64,
    pub leveled_up: bool,
    pub old_level: u32,
    pub new_level: u32,
    /// True on any rank change, demotions included
    pub ranked_up: bool,
    pub old_rank: Rank,
    pub new_rank: Rank,
    /// Ledger entry id, `None` if the audit write failed
    pub transaction_id: Option<String>,
}

impl AwardResult {
    fn new(user_id: &str, old_xp: u64, new_xp: u64, transition: Transition) -> Self {
        Self {
            success: true,
            user_id: user_id.to_string(),
            old_xp,
            new_xp,
            leveled_up: transition.leveled_up,
            old_level: transition.old_level,
            new_level: transition.new_level,
            ranked_up: transition.ranked_up,
            old_rank: transition.old_rank,
            new_rank: transition.new_rank,
            transaction_id: None,
        }
    }

    /// The level/rank transition carried by this result
    pub fn transition(&self) -> Transition {
        Transition {
            leveled_up: self.leveled_up,
            old_level: self.old_level,
            new_level: self.new_level,
            ranked_up: self.ranked_up,
            old_rank: self.old_rank,
            new_rank: self.new_rank,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Applies XP awards against a user store and ledger
pub struct XpEngine {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerStore>,
    max_attempts: u32,
}

impl XpEngine {
    pub fn new(users: Arc<dyn UserStore>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            users,
            ledger,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the compare-and-set attempt budget (minimum 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Award `amount` XP to `user_id`
    pub fn award_xp(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        details: Value,
    ) -> Result<AwardResult, AwardError> {
        self.award(AwardRequest::new(user_id, amount, reason).with_details(details))
    }

    /// Apply an award request
    pub fn award(&self, request: AwardRequest) -> Result<AwardResult, AwardError> {
        let (old, new_state) = self.commit_state(&request.user_id, request.amount)?;

        let transition = detect_transition(old.total_xp, new_state.total_xp);
        let mut result = AwardResult::new(
            &request.user_id,
            old.total_xp,
            new_state.total_xp,
            transition,
        );

        info!(
            user_id = %request.user_id,
            amount = request.amount,
            old_xp = result.old_xp,
            new_xp = result.new_xp,
            leveled_up = result.leveled_up,
            ranked_up = result.ranked_up,
            "XP awarded"
        );

        let entry = XpTransaction::new(
            &request.user_id,
            request.activity_tag(),
            request.amount,
            audit_details(&request, &result),
        );
        result.transaction_id = self.append_ledger_entry(entry);

        Ok(result)
    }

    /// Read-modify-write of the user record with optimistic retry
    ///
    /// Returns the state that was read and the state that was written.
    fn commit_state(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<(UserGameState, GameState), AwardError> {
        for attempt in 1..=self.max_attempts {
            let current = self
                .users
                .get_user(user_id)
                .map_err(AwardError::Persistence)?
                .ok_or_else(|| AwardError::UserNotFound(user_id.to_string()))?;

            let next = current.state().apply_delta(amount);

            match self.users.update_user(user_id, current.version, next) {
                Ok(true) => return Ok((current, next)),
                Ok(false) => {
                    debug!(user_id = %user_id, attempt, "Version conflict, retrying award");
                    std::thread::yield_now();
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(AwardError::UserNotFound(user_id.to_string()));
                }
                Err(e) => return Err(AwardError::Persistence(e)),
            }
        }

        warn!(
            user_id = %user_id,
            attempts = self.max_attempts,
            "Award gave up after repeated conflicts"
        );
        Err(AwardError::Persistence(StoreError::Conflict {
            user_id: user_id.to_string(),
            attempts: self.max_attempts,
        }))
    }

    /// Best-effort ledger append. The state change is already committed,
    /// so a failure is logged and reported as a missing id only.
    fn append_ledger_entry(&self, entry: XpTransaction) -> Option<String> {
        match self.ledger.append_transaction(&entry) {
            Ok(()) => Some(entry.id),
            Err(source) => {
                let err = LedgerWriteError {
                    user_id: entry.user_id.clone(),
                    source,
                };
                warn!(
                    user_id = %entry.user_id,
                    activity = %entry.activity,
                    xp_earned = entry.xp_earned,
                    error = %err,
                    "XP committed without ledger entry"
                );
                None
            }
        }
    }
}

/// Caller details merged with the before/after snapshot
fn audit_details(request: &AwardRequest, result: &AwardResult) -> Value {
    let mut map = match &request.details {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("payload".into(), other.clone());
            map
        }
    };

    map.insert("reason".into(), json!(request.reason));
    map.insert("oldXp".into(), json!(result.old_xp));
    map.insert("newXp".into(), json!(result.new_xp));
    map.insert("oldLevel".into(), json!(result.old_level));
    map.insert("newLevel".into(), json!(result.new_level));
    map.insert("oldRank".into(), json!(result.old_rank.name()));
    map.insert("newRank".into(), json!(result.new_rank.name()));
    if let Some(ref actor) = request.actor {
        map.insert("actor".into(), json!(actor));
    }

    Value::Object(map)
}
