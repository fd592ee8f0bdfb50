//! The persisted timer session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::time::{ms_to_datetime, seconds_to_minutes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// One study session for one goal.
///
/// `accumulated_seconds` is only banked on pause, stop and recovery; the
/// live running portion is always derived from `last_resume_at_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub goal_id: String,
    /// Epoch milliseconds of the original start.
    pub started_at_ms: u64,
    pub accumulated_seconds: u64,
    /// Epoch milliseconds of the latest start/resume. Present iff running.
    #[serde(default)]
    pub last_resume_at_ms: Option<u64>,
    pub state: TimerState,
}

impl TimerSession {
    pub(crate) fn started(goal_id: &str, now_ms: u64) -> Self {
        Self {
            goal_id: goal_id.to_string(),
            started_at_ms: now_ms,
            accumulated_seconds: 0,
            last_resume_at_ms: Some(now_ms),
            state: TimerState::Running,
        }
    }

    /// Whether a stored record is usable at all.
    pub fn is_consistent(&self) -> bool {
        if self.goal_id.is_empty() || self.state == TimerState::Idle {
            return false;
        }
        (self.state == TimerState::Running) == self.last_resume_at_ms.is_some()
    }

    /// Whole seconds elapsed in the current running interval.
    pub fn running_seconds(&self, now_ms: u64) -> u64 {
        match (self.state, self.last_resume_at_ms) {
            (TimerState::Running, Some(last)) => whole_seconds_between(last, now_ms),
            _ => 0,
        }
    }

    /// Elapsed seconds to show right now. Never mutates the session.
    pub fn display_seconds(&self, now_ms: u64) -> u64 {
        self.accumulated_seconds + self.running_seconds(now_ms)
    }

    /// Bank the current running interval and stop the running clock.
    pub(crate) fn bank_running_interval(&mut self, now_ms: u64) {
        self.accumulated_seconds += self.running_seconds(now_ms);
        self.last_resume_at_ms = None;
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        ms_to_datetime(self.started_at_ms)
    }
}

/// What a caller needs to commit a session as a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub goal_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u64,
}

impl SessionData {
    /// Minutes credited for this session (partial minutes round up).
    pub fn minutes(&self) -> u32 {
        seconds_to_minutes(self.duration_seconds)
    }
}

/// Floor of `(to - from) / 1s`; a clock that went backwards counts as zero.
pub(crate) fn whole_seconds_between(from_ms: u64, to_ms: u64) -> u64 {
    to_ms.saturating_sub(from_ms) / 1000
}
