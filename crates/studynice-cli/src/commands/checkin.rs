use clap::Subcommand;
use serde::Serialize;
use studynice_core::storage::Database;
use studynice_core::{AggregateStore, Checkin, CheckinService, Config, UserStreakStats};

use super::{date_or_today, print_json, today, CommandResult};

#[derive(Subcommand)]
pub enum CheckinAction {
    /// Add minutes to a goal's check-in
    Add {
        goal_id: String,
        /// Minutes to add (must be > 0)
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Overwrite a check-in's minutes
    Set {
        id: i64,
        minutes: u32,
    },
    /// List check-ins for a date
    List {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Serialize)]
struct CheckinResult {
    checkin: Checkin,
    stats: UserStreakStats,
}

pub fn run(action: CheckinAction) -> CommandResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let service = CheckinService::new(&db);

    match action {
        CheckinAction::Add { goal_id, minutes, date } => {
            let date = date_or_today(date.as_deref(), &config)?;
            let (checkin, stats) = service.add_minutes(&goal_id, date, minutes, today(&config))?;
            print_json(&CheckinResult { checkin, stats })?;
        }
        CheckinAction::Set { id, minutes } => {
            let (checkin, stats) = service.set_minutes(id, minutes, today(&config))?;
            print_json(&CheckinResult { checkin, stats })?;
        }
        CheckinAction::List { date } => {
            let date = date_or_today(date.as_deref(), &config)?;
            print_json(&db.checkins_on(date)?)?;
        }
    }
    Ok(())
}
