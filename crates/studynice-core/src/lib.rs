//! # StudyNice Core Library
//!
//! This library provides the stateful core of the StudyNice habit tracker:
//! the pieces with real temporal logic. Goal forms, dashboards and calendar
//! rendering live elsewhere and only call into this crate.
//!
//! ## Architecture
//!
//! - **Session Timer**: A wall-clock-based state machine for one study
//!   session that survives process restarts by persisting after every
//!   transition and crediting the unobserved gap on recovery
//! - **Streak Engine**: A pure function from the daily aggregate history to
//!   current/best streaks and lifetime totals
//! - **Check-ins**: Collaborator traits for check-in and aggregate storage,
//!   plus the commit-and-recompute flow that links the two components
//! - **Storage**: SQLite-backed local store and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionTimer`]: Core timer state machine
//! - [`StreakEngine`]: Streak and totals calculator
//! - [`CheckinService`]: Commit, quick-add and recompute operations
//! - [`Database`]: Local implementation of every storage collaborator
//! - [`Config`]: Application configuration management

pub mod checkin;
pub mod error;
pub mod events;
pub mod storage;
pub mod streak;
pub mod timer;
pub mod util;

pub use checkin::{
    AggregateStore, Checkin, CheckinService, CheckinStore, CommitOutcome, Goal, StudySession,
};
pub use error::{ConfigError, CoreError, DatabaseError, TimerError, ValidationError};
pub use events::Event;
pub use storage::{Config, Database, KvSessionStore};
pub use streak::{calculate_streak, DailyAggregate, StreakEngine, UserStreakStats};
pub use timer::{
    Clock, DisplayTicker, FileSessionStore, ManualClock, MemorySessionStore, SessionData,
    SessionStore, SessionTimer, SystemClock, TimerSession, TimerState,
};
