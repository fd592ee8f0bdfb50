use chrono::{DateTime, Days, FixedOffset, Local, NaiveDate, Utc};

use crate::error::ValidationError;

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Minutes credited for a session: partial minutes round up, zero stays zero.
pub fn seconds_to_minutes(seconds: u64) -> u32 {
    if seconds == 0 {
        return 0;
    }
    u32::try_from(seconds.div_ceil(60)).unwrap_or(u32::MAX)
}

pub fn ms_to_datetime(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

/// Calendar day of `now` in the given UTC offset, or the local zone when
/// no offset is configured.
pub fn date_at(now: DateTime<Utc>, utc_offset_minutes: Option<i32>) -> NaiveDate {
    match utc_offset_minutes.and_then(|m| FixedOffset::east_opt(m * 60)) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.with_timezone(&Local).date_naive(),
    }
}

pub fn today(utc_offset_minutes: Option<i32>) -> NaiveDate {
    date_at(Utc::now(), utc_offset_minutes)
}

/// The last `n` days ending at `today`, oldest first. Stops early at the
/// start of the representable calendar.
pub fn last_n_days(today: NaiveDate, n: u32) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = (0..u64::from(n))
        .map_while(|i| today.checked_sub_days(Days::new(i)))
        .collect();
    days.reverse();
    days
}

/// Whole calendar days from `earlier` to `later`.
pub fn days_between(later: NaiveDate, earlier: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}
