//! Gamification admin CLI
//!
//! Operates on the SQLite store in the configured storage directory.
//!
//! ## Usage
//!
//! ```bash
//! # Register a user
//! gamification init-user alice
//!
//! # Reward an engagement activity using the configured XP table
//! gamification award alice --activity like_received
//!
//! # Award an explicit amount
//! gamification award alice --amount 40 --reason "Hackathon winner"
//!
//! # Administrative correction (may be negative)
//! gamification adjust alice --amount -100 --admin ops-1 --reason "Duplicate attendance"
//!
//! # Daily check-in
//! gamification check-in alice
//!
//! # Progress and ledger
//! gamification status alice
//! gamification history alice --limit 20 --summary
//!
//! # Maintenance
//! gamification stats
//! gamification write-config
//! ```

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use gamification_engine::services::LoggingNotificationSink;
use gamification_engine::{AwardRequest, Config, GameDb, Services, TransactionQuery};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gamification")]
#[command(about = "XP, rank and streak administration")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "GAMIFICATION_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory (overrides config)
    #[arg(long, env = "GAMIFICATION_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a user at zero XP
    InitUser {
        user_id: String,
    },

    /// Award XP for an activity or an explicit amount
    Award {
        user_id: String,
        /// Activity tag; uses the configured reward when no amount is given
        #[arg(short, long)]
        activity: Option<String>,
        /// Explicit XP amount
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<i64>,
        /// Reason recorded in the ledger
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Administrative XP correction
    Adjust {
        user_id: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
        /// Admin performing the correction
        #[arg(long)]
        admin: String,
        #[arg(short, long)]
        reason: String,
    },

    /// Daily check-in
    CheckIn {
        user_id: String,
        /// Backfill an earlier day (YYYY-MM-DD); defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show level, rank and streak
    Status {
        user_id: String,
    },

    /// Show ledger entries
    History {
        user_id: String,
        /// Filter by activity tag
        #[arg(short, long)]
        activity: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Print totals instead of entries
        #[arg(long)]
        summary: bool,
    },

    /// Show database row counts
    Stats,

    /// Write the effective configuration as TOML
    WriteConfig {
        /// Destination, defaults to config.toml in the storage directory
        path: Option<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("gamification_engine=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let default_path = Config::default().config_path();
            if default_path.exists() {
                Config::load(&default_path)
                    .with_context(|| format!("Failed to load config from {:?}", default_path))?
            } else {
                Config::default()
            }
        }
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    if let Command::WriteConfig { path } = &args.command {
        let path = path.clone().unwrap_or_else(|| config.config_path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config
            .save(&path)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        info!("Wrote config to {:?}", path);
        return Ok(());
    }

    info!("Using storage directory {:?}", config.storage_dir);
    let db = Arc::new(GameDb::open(&config.storage_dir)?);
    let services = Services::new(db.clone(), &config);
    let dispatcher = services.start_notifications(Arc::new(LoggingNotificationSink));

    match args.command {
        Command::InitUser { user_id } => {
            print_json(&services.xp.create_user(&user_id)?)?;
        }
        Command::Award {
            user_id,
            activity,
            amount,
            reason,
        } => {
            let result = match (amount, activity) {
                (Some(amount), activity) => {
                    let reason = reason
                        .or_else(|| activity.clone())
                        .unwrap_or_else(|| "manual award".to_string());
                    let mut request = AwardRequest::new(&user_id, amount, reason);
                    if let Some(activity) = activity {
                        request = request.with_activity(activity);
                    }
                    services.xp.award(request)?
                }
                (None, Some(activity)) => {
                    match services
                        .xp
                        .award_for_activity(&user_id, &activity, Value::Null)?
                    {
                        Some(result) => result,
                        None => bail!("No reward configured for activity '{}'", activity),
                    }
                }
                (None, None) => bail!("Either --amount or --activity is required"),
            };
            print_json(&result)?;
        }
        Command::Adjust {
            user_id,
            amount,
            admin,
            reason,
        } => {
            print_json(&services.xp.admin_adjust(&user_id, amount, &admin, &reason)?)?;
        }
        Command::CheckIn { user_id, date } => {
            let today = Utc::now().date_naive();
            let outcome = services
                .check_in
                .check_in_on(&user_id, date.unwrap_or(today), today)?;
            print_json(&outcome)?;
        }
        Command::Status { user_id } => match services.progress.progress(&user_id)? {
            Some(view) => print_json(&view)?,
            None => bail!("User not found: {}", user_id),
        },
        Command::History {
            user_id,
            activity,
            limit,
            summary,
        } => {
            let query = TransactionQuery {
                activity,
                limit,
                ..Default::default()
            };
            if summary {
                print_json(&services.progress.summary(&user_id, &query)?)?;
            } else {
                print_json(&services.progress.history(&user_id, &query)?)?;
            }
        }
        Command::Stats => {
            print_json(&db.stats()?)?;
        }
        // Handled before the database is opened
        Command::WriteConfig { .. } => {}
    }

    // Closing the bus lets the dispatcher flush pending notifications and exit
    drop(services);
    dispatcher.await?;

    Ok(())
}
