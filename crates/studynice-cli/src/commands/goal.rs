use clap::Subcommand;
use studynice_core::storage::Database;
use studynice_core::{CheckinService, Config};

use super::{print_json, today, CommandResult};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Create a goal with a daily minute target
    Add {
        /// Goal ID (used by timer and check-in commands)
        id: String,
        /// Daily target in minutes
        #[arg(long)]
        target: u32,
        /// Display title (defaults to the ID)
        #[arg(long)]
        title: Option<String>,
    },
    /// List all goals
    List,
    /// Stop counting a goal's target towards daily totals
    Deactivate {
        id: String,
    },
}

pub fn run(action: GoalAction) -> CommandResult {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        GoalAction::Add { id, target, title } => {
            let title = title.unwrap_or_else(|| id.clone());
            let goal = db.create_goal(&id, &title, target)?;
            refresh_today(&db, &config)?;
            print_json(&goal)?;
        }
        GoalAction::List => {
            print_json(&db.list_goals()?)?;
        }
        GoalAction::Deactivate { id } => {
            db.deactivate_goal(&id)?;
            refresh_today(&db, &config)?;
            print_json(&db.goal(&id)?)?;
        }
    }
    Ok(())
}

/// Targets changed, so today's aggregate and the streak must follow.
fn refresh_today(db: &Database, config: &Config) -> CommandResult {
    let service = CheckinService::new(db);
    let today = today(config);
    service.recompute_day(today)?;
    service.recompute_stats(today)?;
    Ok(())
}
