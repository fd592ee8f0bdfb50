//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - Goals and their daily targets
//! - Per-goal daily check-ins and the timed study session log
//! - Daily aggregates and the derived user streak stats
//! - Key-value store for application state (the persisted timer session)

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::data_dir;
use super::migrations;
use crate::checkin::{AggregateStore, Checkin, CheckinStore, Goal, StudySession};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::streak::{DailyAggregate, UserStreakStats};

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite database standing in for the remote data store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/studynice.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("studynice.db"))
    }

    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Goals ────────────────────────────────────────────────────────

    pub fn create_goal(&self, id: &str, title: &str, daily_target_minutes: u32) -> Result<Goal> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingGoalId.into());
        }
        self.conn.execute(
            "INSERT INTO goals (id, title, daily_target_minutes, is_active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![id, title, daily_target_minutes, Utc::now().to_rfc3339()],
        )?;
        Ok(Goal {
            id: id.to_string(),
            title: title.to_string(),
            daily_target_minutes,
            is_active: true,
        })
    }

    pub fn goal(&self, id: &str) -> Result<Option<Goal>> {
        let goal = self
            .conn
            .query_row(
                "SELECT id, title, daily_target_minutes, is_active FROM goals WHERE id = ?1",
                params![id],
                goal_from_row,
            )
            .optional()?;
        Ok(goal)
    }

    pub fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, daily_target_minutes, is_active FROM goals ORDER BY created_at, id",
        )?;
        let goals = stmt
            .query_map([], goal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    pub fn deactivate_goal(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE goals SET is_active = 0 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(ValidationError::UnknownGoal(id.to_string()).into());
        }
        Ok(())
    }

    // ── Check-ins ────────────────────────────────────────────────────

    pub fn checkin(&self, id: i64) -> Result<Option<Checkin>> {
        let checkin = self
            .conn
            .query_row(
                "SELECT id, goal_id, checkin_date, minutes_studied FROM checkins WHERE id = ?1",
                params![id],
                checkin_from_row,
            )
            .optional()?;
        Ok(checkin)
    }

    pub fn study_sessions_on(&self, date: NaiveDate) -> Result<Vec<StudySession>> {
        let mut stmt = self.conn.prepare(
            "SELECT goal_id, session_date, started_at, ended_at, duration_seconds, notes
             FROM study_sessions WHERE session_date = ?1 ORDER BY started_at",
        )?;
        let sessions = stmt
            .query_map(params![date.format(DATE_FMT).to_string()], |row| {
                Ok(StudySession {
                    goal_id: row.get(0)?,
                    date: date_col(row, 1)?,
                    started_at: datetime_col(row, 2)?,
                    ended_at: datetime_col(row, 3)?,
                    duration_seconds: row.get(4)?,
                    notes: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    // ── Stats ────────────────────────────────────────────────────────

    /// Last saved streak stats, zero when never computed.
    pub fn user_stats(&self) -> Result<UserStreakStats> {
        let stats = self
            .conn
            .query_row(
                "SELECT current_streak, best_streak, total_minutes, total_days_completed
                 FROM user_stats WHERE id = 1",
                [],
                |row| {
                    Ok(UserStreakStats {
                        current_streak: row.get(0)?,
                        best_streak: row.get(1)?,
                        total_minutes: row.get(2)?,
                        total_days_completed: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(stats.unwrap_or_default())
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl CheckinStore for Database {
    fn add_minutes(&self, goal_id: &str, date: NaiveDate, minutes: u32) -> Result<Checkin> {
        if self.goal(goal_id)?.is_none() {
            return Err(ValidationError::UnknownGoal(goal_id.to_string()).into());
        }
        let date_str = date.format(DATE_FMT).to_string();
        self.conn.execute(
            "INSERT INTO checkins (goal_id, checkin_date, minutes_studied, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (goal_id, checkin_date)
             DO UPDATE SET minutes_studied = minutes_studied + excluded.minutes_studied,
                           updated_at = excluded.updated_at",
            params![goal_id, date_str, minutes, Utc::now().to_rfc3339()],
        )?;
        let checkin = self.conn.query_row(
            "SELECT id, goal_id, checkin_date, minutes_studied FROM checkins
             WHERE goal_id = ?1 AND checkin_date = ?2",
            params![goal_id, date_str],
            checkin_from_row,
        )?;
        Ok(checkin)
    }

    fn set_minutes(&self, checkin_id: i64, minutes: u32) -> Result<Checkin> {
        let changed = self.conn.execute(
            "UPDATE checkins SET minutes_studied = ?1, updated_at = ?2 WHERE id = ?3",
            params![minutes, Utc::now().to_rfc3339(), checkin_id],
        )?;
        if changed == 0 {
            return Err(ValidationError::UnknownCheckin(checkin_id).into());
        }
        self.checkin(checkin_id)?
            .ok_or_else(|| ValidationError::UnknownCheckin(checkin_id).into())
    }

    fn record_study_session(&self, session: &StudySession) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO study_sessions
                (goal_id, session_date, started_at, ended_at, duration_seconds, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.goal_id,
                session.date.format(DATE_FMT).to_string(),
                session.started_at.to_rfc3339(),
                session.ended_at.to_rfc3339(),
                session.duration_seconds,
                session.notes,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn commit_study_session(
        &self,
        session: &StudySession,
        minutes: u32,
    ) -> Result<Option<Checkin>> {
        let tx = self.conn.unchecked_transaction()?;
        self.record_study_session(session)?;
        let checkin = if minutes > 0 {
            Some(self.add_minutes(&session.goal_id, session.date, minutes)?)
        } else {
            None
        };
        tx.commit()?;
        Ok(checkin)
    }
}

impl AggregateStore for Database {
    fn active_goals(&self) -> Result<Vec<Goal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, daily_target_minutes, is_active FROM goals
             WHERE is_active = 1 ORDER BY created_at, id",
        )?;
        let goals = stmt
            .query_map([], goal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    fn checkins_on(&self, date: NaiveDate) -> Result<Vec<Checkin>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, goal_id, checkin_date, minutes_studied FROM checkins
             WHERE checkin_date = ?1 ORDER BY goal_id",
        )?;
        let checkins = stmt
            .query_map(params![date.format(DATE_FMT).to_string()], checkin_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(checkins)
    }

    fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO daily_stats
                (stat_date, total_minutes, target_minutes, is_completed)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                aggregate.date.format(DATE_FMT).to_string(),
                aggregate.total_minutes,
                aggregate.target_minutes,
                aggregate.is_completed,
            ],
        )?;
        Ok(())
    }

    fn daily_history(&self) -> Result<Vec<DailyAggregate>> {
        let mut stmt = self.conn.prepare(
            "SELECT stat_date, total_minutes, target_minutes, is_completed
             FROM daily_stats ORDER BY stat_date DESC",
        )?;
        let history = stmt
            .query_map([], |row| {
                Ok(DailyAggregate {
                    date: date_col(row, 0)?,
                    total_minutes: row.get(1)?,
                    target_minutes: row.get(2)?,
                    is_completed: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(history)
    }

    fn save_user_stats(&self, stats: &UserStreakStats) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_stats
                (id, current_streak, best_streak, total_minutes, total_days_completed, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                stats.current_streak,
                stats.best_streak,
                stats.total_minutes,
                stats.total_days_completed,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        title: row.get(1)?,
        daily_target_minutes: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn checkin_from_row(row: &Row<'_>) -> rusqlite::Result<Checkin> {
    Ok(Checkin {
        id: row.get(0)?,
        goal_id: row.get(1)?,
        date: date_col(row, 2)?,
        minutes: row.get(3)?,
    })
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
