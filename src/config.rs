//! Configuration for the gamification engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::DEFAULT_MAX_ATTEMPTS;
use crate::models::activities;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gamification-engine")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Compare-and-set attempts per award before giving up
    #[serde(default = "default_max_update_attempts")]
    pub max_update_attempts: u32,

    /// Capacity of the game event broadcast channel
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// XP granted per action
    #[serde(default)]
    pub rewards: RewardConfig,
}

/// XP amounts for check-ins, streaks and engagement actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// XP for the first check-in of a day
    #[serde(default = "default_daily_checkin_xp")]
    pub daily_checkin: i64,

    /// Bonus XP when a streak reaches exactly `days`
    #[serde(default = "default_streak_milestones")]
    pub streak_milestones: Vec<StreakMilestone>,

    /// XP per engagement activity tag
    #[serde(default = "default_activity_rewards")]
    pub activities: BTreeMap<String, i64>,
}

/// One streak milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakMilestone {
    pub days: u32,
    pub bonus_xp: i64,
}

fn default_max_update_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_notification_capacity() -> usize {
    1024
}

fn default_daily_checkin_xp() -> i64 {
    10
}

fn default_streak_milestones() -> Vec<StreakMilestone> {
    vec![
        StreakMilestone {
            days: 7,
            bonus_xp: 50,
        },
        StreakMilestone {
            days: 30,
            bonus_xp: 200,
        },
        StreakMilestone {
            days: 100,
            bonus_xp: 1000,
        },
    ]
}

fn default_activity_rewards() -> BTreeMap<String, i64> {
    [
        (activities::LIKE_RECEIVED, 2),
        (activities::COMMENT_POSTED, 5),
        (activities::TEAM_JOINED, 25),
        (activities::EVENT_ATTENDED, 50),
        (activities::KYC_SUBMITTED, 100),
    ]
    .into_iter()
    .map(|(activity, xp)| (activity.to_string(), xp))
    .collect()
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            daily_checkin: default_daily_checkin_xp(),
            streak_milestones: default_streak_milestones(),
            activities: default_activity_rewards(),
        }
    }
}

impl RewardConfig {
    /// XP configured for an engagement activity
    pub fn xp_for(&self, activity: &str) -> Option<i64> {
        self.activities.get(activity).copied()
    }

    /// Milestones passed when a streak grows from `from` to `to` days,
    /// shortest first
    pub fn milestones_reached(&self, from: u32, to: u32) -> Vec<&StreakMilestone> {
        let mut reached: Vec<&StreakMilestone> = self
            .streak_milestones
            .iter()
            .filter(|m| m.days > from && m.days <= to)
            .collect();
        reached.sort_by_key(|m| m.days);
        reached
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            max_update_attempts: default_max_update_attempts(),
            notification_capacity: default_notification_capacity(),
            rewards: RewardConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            max_update_attempts = 3

            [rewards]
            daily_checkin = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.max_update_attempts, 3);
        assert_eq!(config.notification_capacity, 1024);
        assert_eq!(config.rewards.daily_checkin, 15);
        let reached = config.rewards.milestones_reached(6, 7);
        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].bonus_xp, 50);
        assert!(config.rewards.milestones_reached(7, 8).is_empty());
        let days: Vec<u32> = config
            .rewards
            .milestones_reached(0, 100)
            .iter()
            .map(|m| m.days)
            .collect();
        assert_eq!(days, vec![7, 30, 100]);
        assert_eq!(config.rewards.xp_for(activities::KYC_SUBMITTED), Some(100));
        assert_eq!(config.rewards.xp_for(activities::ADMIN_ADJUSTMENT), None);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.storage_dir = temp.path().to_path_buf();
        config.rewards.streak_milestones = vec![StreakMilestone {
            days: 3,
            bonus_xp: 30,
        }];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage_dir, temp.path());
        assert_eq!(loaded.rewards.streak_milestones, config.rewards.streak_milestones);
        assert_eq!(loaded.rewards.activities, config.rewards.activities);
    }
}
