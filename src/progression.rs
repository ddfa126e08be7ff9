//! Level and rank derivation from cumulative XP
//!
//! Level and rank are never set directly. They are recomputed from
//! `total_xp` whenever it changes, so a stored state can be checked against
//! these functions at any time.
//!
//! ## Rank Table
//!
//! | Rank        | Min XP  |
//! |-------------|---------|
//! | Newcomer    | 0       |
//! | Explorer    | 100     |
//! | Contributor | 500     |
//! | Builder     | 1,000   |
//! | Expert      | 2,500   |
//! | Master      | 5,000   |
//! | Legend      | 10,000  |
//! | Champion    | 25,000  |
//! | Elite       | 50,000  |
//! | Supreme     | 100,000 |

use serde::{Deserialize, Serialize};
use std::fmt;

/// XP needed per level
pub const XP_PER_LEVEL: u64 = 100;

/// Named rank tiers, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Newcomer,
    Explorer,
    Contributor,
    Builder,
    Expert,
    Master,
    Legend,
    Champion,
    Elite,
    Supreme,
}

/// Rank thresholds, ascending by minimum XP. Must stay sorted and start at 0.
pub const RANK_THRESHOLDS: [(Rank, u64); 10] = [
    (Rank::Newcomer, 0),
    (Rank::Explorer, 100),
    (Rank::Contributor, 500),
    (Rank::Builder, 1_000),
    (Rank::Expert, 2_500),
    (Rank::Master, 5_000),
    (Rank::Legend, 10_000),
    (Rank::Champion, 25_000),
    (Rank::Elite, 50_000),
    (Rank::Supreme, 100_000),
];

impl Rank {
    /// Display name, as stored on the user record
    pub fn name(&self) -> &'static str {
        match self {
            Rank::Newcomer => "Newcomer",
            Rank::Explorer => "Explorer",
            Rank::Contributor => "Contributor",
            Rank::Builder => "Builder",
            Rank::Expert => "Expert",
            Rank::Master => "Master",
            Rank::Legend => "Legend",
            Rank::Champion => "Champion",
            Rank::Elite => "Elite",
            Rank::Supreme => "Supreme",
        }
    }

    /// Parse a stored rank name
    pub fn from_name(name: &str) -> Option<Self> {
        RANK_THRESHOLDS
            .iter()
            .map(|(rank, _)| *rank)
            .find(|rank| rank.name() == name)
    }

    /// Minimum XP required to hold this rank
    pub fn min_xp(&self) -> u64 {
        RANK_THRESHOLDS
            .iter()
            .find(|(rank, _)| rank == self)
            .map(|(_, min)| *min)
            .unwrap_or(0)
    }

    /// The rank directly above this one, if any
    pub fn next(&self) -> Option<Rank> {
        let idx = RANK_THRESHOLDS.iter().position(|(rank, _)| rank == self)?;
        RANK_THRESHOLDS.get(idx + 1).map(|(rank, _)| *rank)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Level for a given XP total: `floor(xp / 100) + 1`
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

/// Highest rank whose threshold does not exceed `xp`
pub fn rank_for_xp(xp: u64) -> Rank {
    RANK_THRESHOLDS
        .iter()
        .rev()
        .find(|(_, min_xp)| *min_xp <= xp)
        .map(|(rank, _)| *rank)
        .unwrap_or(Rank::Newcomer)
}

/// XP still needed to reach the next level
pub fn xp_to_next_level(xp: u64) -> u64 {
    XP_PER_LEVEL - xp % XP_PER_LEVEL
}

/// XP still needed to reach the next rank, `None` at the top rank
pub fn xp_to_next_rank(xp: u64) -> Option<u64> {
    rank_for_xp(xp).next().map(|next| next.min_xp() - xp)
}

/// Level and rank changes between two XP totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub leveled_up: bool,
    pub old_level: u32,
    pub new_level: u32,
    /// True on any rank change, including a demotion
    pub ranked_up: bool,
    pub old_rank: Rank,
    pub new_rank: Rank,
}

impl Transition {
    /// True when the rank moved downwards (negative correction)
    pub fn is_demotion(&self) -> bool {
        self.new_rank < self.old_rank
    }
}

/// Compare derived level and rank before and after an XP change
pub fn detect_transition(old_xp: u64, new_xp: u64) -> Transition {
    let old_level = level_for_xp(old_xp);
    let new_level = level_for_xp(new_xp);
    let old_rank = rank_for_xp(old_xp);
    let new_rank = rank_for_xp(new_xp);

    Transition {
        leveled_up: new_level > old_level,
        old_level,
        new_level,
        ranked_up: new_rank != old_rank,
        old_rank,
        new_rank,
    }
}

/// A consistent `(total_xp, level, rank)` triple
///
/// The only way to build a state for persistence. Level and rank always
/// agree with `total_xp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub total_xp: u64,
    pub level: u32,
    pub rank: Rank,
}

impl GameState {
    /// Derive the full state from an XP total
    pub fn from_xp(total_xp: u64) -> Self {
        Self {
            total_xp,
            level: level_for_xp(total_xp),
            rank: rank_for_xp(total_xp),
        }
    }

    /// Apply a signed delta, clamping the result at zero
    pub fn apply_delta(&self, amount: i64) -> Self {
        let new_xp = if amount < 0 {
            self.total_xp.saturating_sub(amount.unsigned_abs())
        } else {
            self.total_xp.saturating_add(amount as u64)
        };
        Self::from_xp(new_xp)
    }

    /// True if level and rank match what `total_xp` derives
    pub fn is_consistent(&self) -> bool {
        *self == Self::from_xp(self.total_xp)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::from_xp(0)
    }
}
