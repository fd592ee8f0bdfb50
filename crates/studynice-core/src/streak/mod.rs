//! Consecutive-day streaks and lifetime totals.
//!
//! Stats are always re-derived from the full daily aggregate history; no
//! day-to-day counter is ever trusted or patched in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::time::days_between;

/// One user's study total for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_minutes: u32,
    pub target_minutes: u32,
    pub is_completed: bool,
}

impl DailyAggregate {
    /// A day is completed once a positive target is met.
    pub fn new(date: NaiveDate, total_minutes: u32, target_minutes: u32) -> Self {
        Self {
            date,
            total_minutes,
            target_minutes,
            is_completed: target_minutes > 0 && total_minutes >= target_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreakStats {
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_minutes: u64,
    pub total_days_completed: u32,
}

/// Pure streak calculator. Holds no state, so it can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreakEngine;

impl StreakEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute stats for `history` as seen on `today`.
    ///
    /// Input order does not matter. Only one aggregate per date is counted;
    /// if a date appears twice the completed, larger entry wins.
    ///
    /// The current streak is "live" only when the most recent aggregate is
    /// dated today or yesterday. An unfinished aggregate for today does not
    /// break it, since the day is still in progress.
    pub fn compute(&self, history: &[DailyAggregate], today: NaiveDate) -> UserStreakStats {
        let mut days: Vec<&DailyAggregate> = history.iter().collect();
        days.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.is_completed.cmp(&a.is_completed))
                .then(b.total_minutes.cmp(&a.total_minutes))
                .then(b.target_minutes.cmp(&a.target_minutes))
        });
        days.dedup_by_key(|d| d.date);

        let mut stats = UserStreakStats::default();
        let mut run: u32 = 0;
        let mut live = false;
        let mut prev_date: Option<NaiveDate> = None;

        for (i, day) in days.iter().enumerate() {
            stats.total_minutes += u64::from(day.total_minutes);

            if i == 0 {
                let age = days_between(today, day.date);
                live = if day.is_completed { age <= 1 } else { age <= 0 };
            }

            if day.is_completed {
                stats.total_days_completed += 1;
                match prev_date.map(|prev| days_between(prev, day.date)) {
                    None | Some(1) => run += 1,
                    Some(_) => {
                        run = 1;
                        live = false;
                    }
                }
                if live {
                    stats.current_streak = run;
                }
                stats.best_streak = stats.best_streak.max(run);
            } else {
                run = 0;
                if i > 0 {
                    live = false;
                }
            }

            prev_date = Some(day.date);
        }

        debug!(
            days = days.len(),
            current = stats.current_streak,
            best = stats.best_streak,
            "streak stats computed"
        );
        stats
    }
}

/// Shorthand for `StreakEngine::new().compute(history, today)`.
pub fn calculate_streak(history: &[DailyAggregate], today: NaiveDate) -> UserStreakStats {
    StreakEngine::new().compute(history, today)
}
