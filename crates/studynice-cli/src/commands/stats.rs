use clap::Subcommand;
use studynice_core::storage::Database;
use studynice_core::util::time::last_n_days;
use studynice_core::{AggregateStore, CheckinService, Config, DailyAggregate};

use super::{print_json, today, CommandResult};

const MAX_HISTORY_DAYS: i64 = 3_660;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Stored streak stats
    Show,
    /// Rebuild today's aggregate and the streak stats
    Recompute,
    /// Daily totals for the last N days, oldest first
    History {
        #[arg(
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_DAYS)
        )]
        days: u32,
    },
}

pub fn run(action: StatsAction) -> CommandResult {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        StatsAction::Show => {
            print_json(&db.user_stats()?)?;
        }
        StatsAction::Recompute => {
            let service = CheckinService::new(&db);
            let today = today(&config);
            service.recompute_day(today)?;
            print_json(&service.recompute_stats(today)?)?;
        }
        StatsAction::History { days } => {
            let recorded = db.daily_history()?;
            let history: Vec<DailyAggregate> = last_n_days(today(&config), days)
                .into_iter()
                .map(|date| {
                    recorded
                        .iter()
                        .find(|a| a.date == date)
                        .cloned()
                        .unwrap_or_else(|| DailyAggregate::new(date, 0, 0))
                })
                .collect();
            print_json(&history)?;
        }
    }
    Ok(())
}
