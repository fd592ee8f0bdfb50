use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::streak::UserStreakStats;
use crate::timer::TimerState;

/// Every state change in the system produces an Event.
/// The CLI prints them; a UI layer renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        goal_id: String,
        at: DateTime<Utc>,
    },
    TimerPaused {
        accumulated_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        accumulated_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        goal_id: String,
        duration_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// An in-progress session was abandoned on the caller's explicit request.
    SessionDiscarded {
        goal_id: String,
        state: TimerState,
        abandoned_seconds: u64,
        at: DateTime<Utc>,
    },
    /// A finished session was written as a check-in.
    SessionCommitted {
        goal_id: String,
        date: NaiveDate,
        duration_seconds: u64,
        minutes: u32,
        at: DateTime<Utc>,
    },
    StatsRecomputed {
        stats: UserStreakStats,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        goal_id: Option<String>,
        display_seconds: u64,
        display: String,
        at: DateTime<Utc>,
    },
}
