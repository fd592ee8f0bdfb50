pub mod checkin;
pub mod config;
pub mod goal;
pub mod stats;
pub mod timer;

use chrono::NaiveDate;
use serde::Serialize;
use studynice_core::util::time;
use studynice_core::Config;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Calendar date "now" in the configured offset.
pub fn today(config: &Config) -> NaiveDate {
    time::today(config.utc_offset_minutes())
}

/// `--date` if given, else today.
pub fn date_or_today(date: Option<&str>, config: &Config) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(value) => Ok(time::parse_date(value)?),
        None => Ok(today(config)),
    }
}
