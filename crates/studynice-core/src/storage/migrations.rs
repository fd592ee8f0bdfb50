//! Database schema migrations for studynice.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{info, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < SCHEMA_VERSION {
        info!(from = current_version, to = SCHEMA_VERSION, "database migrated");
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (fresh database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: goals, check-ins, daily aggregates, user stats and kv.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS goals (
            id                   TEXT PRIMARY KEY,
            title                TEXT NOT NULL,
            daily_target_minutes INTEGER NOT NULL,
            is_active            INTEGER NOT NULL DEFAULT 1,
            created_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checkins (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id         TEXT NOT NULL,
            checkin_date    TEXT NOT NULL,
            minutes_studied INTEGER NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE (goal_id, checkin_date)
        );

        CREATE TABLE IF NOT EXISTS daily_stats (
            stat_date      TEXT PRIMARY KEY,
            total_minutes  INTEGER NOT NULL,
            target_minutes INTEGER NOT NULL,
            is_completed   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_stats (
            id                   INTEGER PRIMARY KEY CHECK (id = 1),
            current_streak       INTEGER NOT NULL,
            best_streak          INTEGER NOT NULL,
            total_minutes        INTEGER NOT NULL,
            total_days_completed INTEGER NOT NULL,
            updated_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: timed study session log.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS study_sessions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id          TEXT NOT NULL,
            session_date     TEXT NOT NULL,
            started_at       TEXT NOT NULL,
            ended_at         TEXT NOT NULL,
            duration_seconds INTEGER NOT NULL,
            notes            TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_study_sessions_date ON study_sessions(session_date);
        CREATE INDEX IF NOT EXISTS idx_checkins_date ON checkins(checkin_date);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
