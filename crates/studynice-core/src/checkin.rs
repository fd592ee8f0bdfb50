//! Check-in commits and daily aggregate recomputation.
//!
//! The core never owns goal or check-in storage. It computes minute deltas,
//! hands them to a [`CheckinStore`], then rebuilds the day's
//! [`DailyAggregate`] and the user's streak stats through an
//! [`AggregateStore`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result, TimerError, ValidationError};
use crate::events::Event;
use crate::streak::{DailyAggregate, StreakEngine, UserStreakStats};
use crate::timer::{Clock, SessionData, SessionStore, SessionTimer, TimerState};
use crate::util::time::{ms_to_datetime, seconds_to_minutes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub daily_target_minutes: u32,
    pub is_active: bool,
}

/// Minutes studied for one goal on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: i64,
    pub goal_id: String,
    pub date: NaiveDate,
    pub minutes: u32,
}

/// A single timed session, logged alongside the check-in it fed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub goal_id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub notes: Option<String>,
}

/// Write side for check-ins.
pub trait CheckinStore {
    /// Add to the goal's record for `date`, creating it if needed.
    fn add_minutes(&self, goal_id: &str, date: NaiveDate, minutes: u32) -> Result<Checkin>;

    /// Overwrite a record's minute value.
    fn set_minutes(&self, checkin_id: i64, minutes: u32) -> Result<Checkin>;

    fn record_study_session(&self, session: &StudySession) -> Result<i64>;

    /// Log `session` and credit `minutes` to its goal and date.
    ///
    /// Zero minutes logs the session only. Stores that can should override
    /// this so both writes land or neither does.
    fn commit_study_session(
        &self,
        session: &StudySession,
        minutes: u32,
    ) -> Result<Option<Checkin>> {
        self.record_study_session(session)?;
        if minutes == 0 {
            return Ok(None);
        }
        self.add_minutes(&session.goal_id, session.date, minutes).map(Some)
    }
}

/// Read/write side for per-day aggregates and the derived stats.
pub trait AggregateStore {
    fn active_goals(&self) -> Result<Vec<Goal>>;

    fn checkins_on(&self, date: NaiveDate) -> Result<Vec<Checkin>>;

    fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<()>;

    fn daily_history(&self) -> Result<Vec<DailyAggregate>>;

    fn save_user_stats(&self, stats: &UserStreakStats) -> Result<()>;
}

/// Result of committing a finished timer session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub event: Event,
    /// `None` when the session was too short to credit any minutes.
    pub checkin: Option<Checkin>,
    /// `None` when the user has no active goals to measure against.
    pub aggregate: Option<DailyAggregate>,
    pub stats: UserStreakStats,
}

/// Drives check-in writes and the recompute that must follow each one.
pub struct CheckinService<'a, T> {
    store: &'a T,
    engine: StreakEngine,
}

impl<'a, T: CheckinStore + AggregateStore> CheckinService<'a, T> {
    pub fn new(store: &'a T) -> Self {
        Self {
            store,
            engine: StreakEngine::new(),
        }
    }

    /// Manually credit minutes to a goal (the "quick add" path).
    pub fn add_minutes(
        &self,
        goal_id: &str,
        date: NaiveDate,
        minutes: i64,
        today: NaiveDate,
    ) -> Result<(Checkin, UserStreakStats)> {
        if goal_id.trim().is_empty() {
            return Err(ValidationError::MissingGoalId.into());
        }
        let minutes = match u32::try_from(minutes) {
            Ok(m) if m > 0 => m,
            _ => return Err(ValidationError::InvalidMinutes { minutes }.into()),
        };
        let checkin = collaborator("add_minutes", self.store.add_minutes(goal_id, date, minutes))?;
        info!(goal_id, %date, minutes, total = checkin.minutes, "check-in minutes added");
        let stats = self.refresh_after_write(date, today)?.1;
        Ok((checkin, stats))
    }

    /// Overwrite a check-in's minutes; zero is allowed.
    pub fn set_minutes(
        &self,
        checkin_id: i64,
        minutes: u32,
        today: NaiveDate,
    ) -> Result<(Checkin, UserStreakStats)> {
        let checkin = collaborator("set_minutes", self.store.set_minutes(checkin_id, minutes))?;
        info!(checkin_id, minutes, "check-in minutes overwritten");
        let stats = self.refresh_after_write(checkin.date, today)?.1;
        Ok((checkin, stats))
    }

    /// Rebuild one date's aggregate from its check-ins and the active goals.
    ///
    /// Returns `None` without writing anything when no goal is active.
    pub fn recompute_day(&self, date: NaiveDate) -> Result<Option<DailyAggregate>> {
        let goals = collaborator("active_goals", self.store.active_goals())?;
        if goals.is_empty() {
            debug!(%date, "no active goals; daily aggregate left untouched");
            return Ok(None);
        }

        let checkins = collaborator("checkins_on", self.store.checkins_on(date))?;
        let total: u32 = checkins.iter().map(|c| c.minutes).sum();
        let target: u32 = goals.iter().map(|g| g.daily_target_minutes).sum();
        let aggregate = DailyAggregate::new(date, total, target);

        collaborator(
            "upsert_daily_aggregate",
            self.store.upsert_daily_aggregate(&aggregate),
        )?;
        debug!(%date, total, target, completed = aggregate.is_completed, "daily aggregate recomputed");
        Ok(Some(aggregate))
    }

    /// Run the streak engine over the full history and persist the result.
    pub fn recompute_stats(&self, today: NaiveDate) -> Result<UserStreakStats> {
        let history = collaborator("daily_history", self.store.daily_history())?;
        let stats = self.engine.compute(&history, today);
        collaborator("save_user_stats", self.store.save_user_stats(&stats))?;
        Ok(stats)
    }

    /// Log a session and credit its minutes to `date`.
    ///
    /// Once the writes succeed, a failing refresh is reported as
    /// [`CoreError::RecomputeFailed`]; the minutes are already credited and
    /// must not be committed again.
    pub fn commit_session(
        &self,
        data: &SessionData,
        ended_at: DateTime<Utc>,
        date: NaiveDate,
        notes: Option<&str>,
        today: NaiveDate,
    ) -> Result<CommitOutcome> {
        let minutes = seconds_to_minutes(data.duration_seconds);
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let session = StudySession {
            goal_id: data.goal_id.clone(),
            date,
            started_at: data.started_at,
            ended_at,
            duration_seconds: data.duration_seconds,
            notes: notes.map(str::to_string),
        };
        let checkin = collaborator(
            "commit_study_session",
            self.store.commit_study_session(&session, minutes),
        )?;

        let (aggregate, stats) = self.refresh_after_write(date, today)?;
        info!(
            goal_id = %data.goal_id,
            %date,
            duration_seconds = data.duration_seconds,
            minutes,
            "session committed"
        );
        Ok(CommitOutcome {
            event: Event::SessionCommitted {
                goal_id: data.goal_id.clone(),
                date,
                duration_seconds: data.duration_seconds,
                minutes,
                at: ended_at,
            },
            checkin,
            aggregate,
            stats,
        })
    }

    /// Commit a finished timer and reset it.
    ///
    /// If the session could not be written the timer is left exactly as it
    /// was so the caller can retry. Once it is written the timer is reset
    /// even when the refresh afterwards fails.
    pub fn commit_timer<S: SessionStore, C: Clock>(
        &self,
        timer: &mut SessionTimer<S, C>,
        notes: Option<&str>,
        today: NaiveDate,
    ) -> Result<CommitOutcome> {
        let state = timer.state();
        if state != TimerState::Finished {
            return Err(TimerError::NotFinished { state }.into());
        }
        let data = timer
            .session_data()
            .ok_or(TimerError::NotFinished { state })?;
        let ended_at = ms_to_datetime(timer.clock().now_ms());

        match self.commit_session(&data, ended_at, today, notes, today) {
            Ok(outcome) => {
                timer.reset();
                Ok(outcome)
            }
            Err(e @ CoreError::RecomputeFailed { .. }) => {
                timer.reset();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Recompute after a check-in write has already been stored.
    fn refresh_after_write(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<(Option<DailyAggregate>, UserStreakStats)> {
        let refreshed = self
            .recompute_day(date)
            .and_then(|aggregate| Ok((aggregate, self.recompute_stats(today)?)));
        refreshed.map_err(|source| {
            warn!(%date, error = %source, "check-in saved but recompute failed");
            CoreError::RecomputeFailed {
                date,
                source: Box::new(source),
            }
        })
    }
}

/// Tag storage failures with the collaborator call that produced them.
fn collaborator<T>(operation: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        CoreError::Validation(_) | CoreError::Collaborator { .. } => e,
        other => CoreError::Collaborator {
            operation: operation.to_string(),
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::timer::{ManualClock, MemorySessionStore};
    use chrono::Duration;
    use std::cell::Cell;

    const T0: u64 = 1_700_000_000_000;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn db_with_goals() -> Database {
        let db = Database::open_memory().unwrap();
        db.create_goal("rust", "Rust", 30).unwrap();
        db.create_goal("math", "Math", 20).unwrap();
        db
    }

    fn finished_timer(
        seconds: u64,
    ) -> (SessionTimer<MemorySessionStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let mut timer = SessionTimer::restore_with_clock(MemorySessionStore::new(), clock.clone());
        timer.start("rust").unwrap();
        clock.advance_secs(seconds);
        timer.stop();
        (timer, clock)
    }

    #[test]
    fn recompute_day_sums_checkins_against_active_targets() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        db.add_minutes("rust", today(), 40).unwrap();
        db.add_minutes("math", today(), 5).unwrap();

        let aggregate = service.recompute_day(today()).unwrap().unwrap();
        assert_eq!(aggregate.total_minutes, 45);
        assert_eq!(aggregate.target_minutes, 50);
        assert!(!aggregate.is_completed);

        db.add_minutes("math", today(), 5).unwrap();
        let aggregate = service.recompute_day(today()).unwrap().unwrap();
        assert!(aggregate.is_completed);
        assert_eq!(db.daily_history().unwrap(), vec![aggregate]);
    }

    #[test]
    fn recompute_day_without_active_goals_writes_nothing() {
        let db = Database::open_memory().unwrap();
        let service = CheckinService::new(&db);
        assert!(service.recompute_day(today()).unwrap().is_none());
        assert!(db.daily_history().unwrap().is_empty());
    }

    #[test]
    fn add_minutes_rejects_non_positive_values() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        for bad in [0, -5] {
            let err = service.add_minutes("rust", today(), bad, today()).unwrap_err();
            assert!(matches!(
                err,
                CoreError::Validation(ValidationError::InvalidMinutes { .. })
            ));
        }
        assert!(db.checkins_on(today()).unwrap().is_empty());
    }

    #[test]
    fn add_minutes_accumulates_same_day_record() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        let (first, _) = service.add_minutes("rust", today(), 10, today()).unwrap();
        let (second, _) = service.add_minutes("rust", today(), 15, today()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.minutes, 25);
    }

    #[test]
    fn set_minutes_overwrites_and_recomputes() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        let (checkin, _) = service.add_minutes("rust", today(), 10, today()).unwrap();
        service.add_minutes("math", today(), 20, today()).unwrap();

        let (updated, stats) = service.set_minutes(checkin.id, 30, today()).unwrap();
        assert_eq!(updated.minutes, 30);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.total_minutes, 50);
        assert_eq!(db.user_stats().unwrap(), stats);
    }

    #[test]
    fn commit_timer_credits_rounded_minutes_and_resets() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        let (mut timer, _clock) = finished_timer(119);

        let outcome = service.commit_timer(&mut timer, Some("  ch. 4  "), today()).unwrap();
        assert_eq!(outcome.checkin.as_ref().unwrap().minutes, 2);
        assert_eq!(outcome.aggregate.as_ref().unwrap().total_minutes, 2);
        assert_eq!(outcome.stats.total_minutes, 2);
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(timer.store().raw().is_none());

        let sessions = db.study_sessions_on(today()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_seconds, 119);
        assert_eq!(sessions[0].notes.as_deref(), Some("ch. 4"));
    }

    #[test]
    fn commit_timer_with_zero_seconds_credits_nothing() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        let (mut timer, _clock) = finished_timer(0);

        let outcome = service.commit_timer(&mut timer, None, today()).unwrap();
        assert!(outcome.checkin.is_none());
        assert!(db.checkins_on(today()).unwrap().is_empty());
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[test]
    fn commit_timer_requires_finished_session() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        let clock = ManualClock::new(T0);
        let mut timer = SessionTimer::restore_with_clock(MemorySessionStore::new(), clock.clone());
        timer.start("rust").unwrap();

        let err = service.commit_timer(&mut timer, None, today()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Timer(TimerError::NotFinished {
                state: TimerState::Running
            })
        ));
        assert_eq!(timer.state(), TimerState::Running);
    }

    #[test]
    fn commit_builds_streak_over_several_days() {
        let db = db_with_goals();
        let service = CheckinService::new(&db);
        for offset in [2, 1, 0] {
            let date = today() - Duration::days(offset);
            service.add_minutes("rust", date, 30, today()).unwrap();
            service.add_minutes("math", date, 20, today()).unwrap();
        }
        let stats = db.user_stats().unwrap();
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.total_days_completed, 3);
        assert_eq!(stats.total_minutes, 150);
    }

    struct FailingStore;

    impl CheckinStore for FailingStore {
        fn add_minutes(&self, _: &str, _: NaiveDate, _: u32) -> Result<Checkin> {
            Err(CoreError::Custom("connection reset".into()))
        }
        fn set_minutes(&self, _: i64, _: u32) -> Result<Checkin> {
            Err(CoreError::Custom("connection reset".into()))
        }
        fn record_study_session(&self, _: &StudySession) -> Result<i64> {
            Ok(1)
        }
    }

    impl AggregateStore for FailingStore {
        fn active_goals(&self) -> Result<Vec<Goal>> {
            Ok(Vec::new())
        }
        fn checkins_on(&self, _: NaiveDate) -> Result<Vec<Checkin>> {
            Ok(Vec::new())
        }
        fn upsert_daily_aggregate(&self, _: &DailyAggregate) -> Result<()> {
            Ok(())
        }
        fn daily_history(&self) -> Result<Vec<DailyAggregate>> {
            Ok(Vec::new())
        }
        fn save_user_stats(&self, _: &UserStreakStats) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn collaborator_failure_leaves_timer_intact() {
        let service = CheckinService::new(&FailingStore);
        let (mut timer, _clock) = finished_timer(600);

        let err = service.commit_timer(&mut timer, None, today()).unwrap_err();
        match err {
            CoreError::Collaborator { operation, .. } => {
                assert_eq!(operation, "commit_study_session")
            }
            other => panic!("Expected Collaborator error, got {other:?}"),
        }
        assert_eq!(timer.state(), TimerState::Finished);
        assert_eq!(timer.display_seconds(), 600);
        assert!(timer.store().raw().is_some());
    }

    /// Delegates to a real database but fails the next stats save.
    struct FlakyStats<'a> {
        db: &'a Database,
        fail_next_save: Cell<bool>,
    }

    impl<'a> FlakyStats<'a> {
        fn new(db: &'a Database) -> Self {
            Self {
                db,
                fail_next_save: Cell::new(true),
            }
        }
    }

    impl CheckinStore for FlakyStats<'_> {
        fn add_minutes(&self, goal_id: &str, date: NaiveDate, minutes: u32) -> Result<Checkin> {
            self.db.add_minutes(goal_id, date, minutes)
        }
        fn set_minutes(&self, checkin_id: i64, minutes: u32) -> Result<Checkin> {
            self.db.set_minutes(checkin_id, minutes)
        }
        fn record_study_session(&self, session: &StudySession) -> Result<i64> {
            self.db.record_study_session(session)
        }
        fn commit_study_session(
            &self,
            session: &StudySession,
            minutes: u32,
        ) -> Result<Option<Checkin>> {
            self.db.commit_study_session(session, minutes)
        }
    }

    impl AggregateStore for FlakyStats<'_> {
        fn active_goals(&self) -> Result<Vec<Goal>> {
            self.db.active_goals()
        }
        fn checkins_on(&self, date: NaiveDate) -> Result<Vec<Checkin>> {
            self.db.checkins_on(date)
        }
        fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<()> {
            self.db.upsert_daily_aggregate(aggregate)
        }
        fn daily_history(&self) -> Result<Vec<DailyAggregate>> {
            self.db.daily_history()
        }
        fn save_user_stats(&self, stats: &UserStreakStats) -> Result<()> {
            if self.fail_next_save.replace(false) {
                return Err(CoreError::Custom("disk full".into()));
            }
            self.db.save_user_stats(stats)
        }
    }

    #[test]
    fn recompute_failure_after_commit_is_not_credited_twice() {
        let db = db_with_goals();
        let store = FlakyStats::new(&db);
        let service = CheckinService::new(&store);
        let (mut timer, _clock) = finished_timer(600);

        let err = service.commit_timer(&mut timer, None, today()).unwrap_err();
        match err {
            CoreError::RecomputeFailed { date, .. } => assert_eq!(date, today()),
            other => panic!("Expected RecomputeFailed, got {other:?}"),
        }
        assert_eq!(timer.state(), TimerState::Idle);
        assert!(timer.store().raw().is_none());

        let retry = service.commit_timer(&mut timer, None, today()).unwrap_err();
        assert!(matches!(
            retry,
            CoreError::Timer(TimerError::NotFinished {
                state: TimerState::Idle
            })
        ));
        assert_eq!(db.checkins_on(today()).unwrap()[0].minutes, 10);
        assert_eq!(db.study_sessions_on(today()).unwrap().len(), 1);

        let stats = service.recompute_stats(today()).unwrap();
        assert_eq!(stats.total_minutes, 10);
        assert_eq!(db.user_stats().unwrap(), stats);
    }

    #[test]
    fn quick_add_reports_recompute_failure_after_saving() {
        let db = db_with_goals();
        let store = FlakyStats::new(&db);
        let service = CheckinService::new(&store);

        let err = service.add_minutes("rust", today(), 15, today()).unwrap_err();
        assert!(matches!(err, CoreError::RecomputeFailed { .. }));
        assert_eq!(db.checkins_on(today()).unwrap()[0].minutes, 15);
        assert_eq!(db.daily_history().unwrap()[0].total_minutes, 15);
    }
}
