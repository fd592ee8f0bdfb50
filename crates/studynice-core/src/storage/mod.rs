mod config;
pub mod database;
pub mod migrations;
mod session_store;

pub use config::{CalendarConfig, Config, TimerConfig};
pub use database::Database;
pub use session_store::KvSessionStore;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `STUDYNICE_DATA_DIR` wins when set. Otherwise `~/.config/studynice[-dev]/`
/// based on `STUDYNICE_ENV` (set `STUDYNICE_ENV=dev` for the development
/// directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("STUDYNICE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYNICE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studynice-dev")
            } else {
                base_dir.join("studynice")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
