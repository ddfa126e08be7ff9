//! Gamification Engine - XP, levels, ranks and streaks
//!
//! Converts user actions (check-ins, likes, comments, team joins, event
//! attendance, KYC submission, admin adjustments) into experience points,
//! keeps level and rank derived from cumulative XP, records an auditable
//! ledger and notifies users on level-up and rank-up.
//!
//! ## Architecture
//!
//! - **progression**: pure level/rank derivation and transition detection
//! - **engine**: award pipeline (compare-and-set user state, then ledger)
//! - **streak**: consecutive-day streaks recomputed from check-in history
//! - **services**: reward config, check-in guard, events, notifications
//! - **store / db**: store traits with in-memory and SQLite backends
//!
//! ## Critical Path
//!
//! | Step              | On failure                         |
//! |-------------------|------------------------------------|
//! | Read user         | `UserNotFound` / `Persistence`     |
//! | Write user state  | `Persistence`, no ledger entry     |
//! | Append ledger     | logged, award still succeeds       |
//! | Notify            | swallowed by the dispatcher task   |

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod progression;
pub mod services;
pub mod store;
pub mod streak;
pub mod summary;

// Re-exports
pub use config::Config;
pub use db::GameDb;
pub use engine::{AwardRequest, AwardResult, XpEngine};
pub use error::{AwardError, CheckInError, StoreError};
pub use models::{activities, TransactionQuery, UserGameState, XpTransaction};
pub use progression::{detect_transition, level_for_xp, rank_for_xp, GameState, Rank, Transition};
pub use services::Services;
pub use store::{CheckInStore, LedgerStore, MemoryStore, UserStore};
pub use streak::{streak_from_dates, StreakEvaluator, StreakSummary};
pub use summary::{summarize, XpSummary};
