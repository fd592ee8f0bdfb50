use clap::Subcommand;
use studynice_core::storage::Database;
use studynice_core::{
    CheckinService, Clock, Config, DisplayTicker, KvSessionStore, SessionTimer, TimerState,
    ValidationError,
};

use super::{print_json, today, CommandResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session for a goal
    Start {
        /// Goal ID to study
        goal_id: String,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Finish the session; `commit` credits it
    Stop,
    /// Drop any session without crediting it
    Reset,
    /// Abandon the current session (needs --yes)
    Discard {
        #[arg(long)]
        yes: bool,
    },
    /// Print current timer state as JSON
    Status,
    /// Print the timer display while the session runs
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Log a finished session and add its minutes to today's check-in
    Commit {
        /// Free-form notes stored with the session
        #[arg(long)]
        notes: Option<String>,
    },
}

pub fn run(action: TimerAction) -> CommandResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut timer = SessionTimer::restore(KvSessionStore::new(&db, &config.timer.session_owner));

    match action {
        TimerAction::Start { goal_id } => {
            if db.goal(&goal_id)?.is_none() {
                return Err(ValidationError::UnknownGoal(goal_id).into());
            }
            let event = timer.start(&goal_id)?;
            print_json(&event)?;
        }
        TimerAction::Pause => match timer.pause() {
            Some(event) => print_json(&event)?,
            None => print_json(&timer.snapshot())?,
        },
        TimerAction::Resume => match timer.resume() {
            Some(event) => print_json(&event)?,
            None => print_json(&timer.snapshot())?,
        },
        TimerAction::Stop => match timer.stop() {
            Some(event) => print_json(&event)?,
            None => print_json(&timer.snapshot())?,
        },
        TimerAction::Reset => {
            print_json(&timer.reset())?;
        }
        TimerAction::Discard { yes } => {
            if !yes && timer.has_active_session() {
                return Err(format!(
                    "refusing to discard {} session for '{}' without --yes",
                    timer.display(),
                    timer.goal_id().unwrap_or_default()
                )
                .into());
            }
            match timer.discard() {
                Some(event) => print_json(&event)?,
                None => print_json(&timer.snapshot())?,
            }
        }
        TimerAction::Status => {
            print_json(&timer.snapshot())?;
        }
        TimerAction::Watch { ticks } => {
            let mut ticker = DisplayTicker::new(config.timer.refresh_interval_ms);
            let mut shown = 0u64;
            loop {
                if ticker.poll_clock(timer.clock()) {
                    println!("{}", serde_json::to_string(&timer.snapshot())?);
                    shown += 1;
                    if ticks.is_some_and(|n| shown >= n) || timer.state() != TimerState::Running {
                        break;
                    }
                }
                std::thread::sleep(ticker.time_until_due(timer.clock().now_ms()));
            }
        }
        TimerAction::Commit { notes } => {
            let service = CheckinService::new(&db);
            let outcome = service.commit_timer(&mut timer, notes.as_deref(), today(&config))?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}
