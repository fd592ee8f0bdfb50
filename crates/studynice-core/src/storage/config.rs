//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Timer display refresh rate and the session owner key
//! - Which UTC offset decides "today" for check-ins and streaks
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::timer::MAX_REFRESH_INTERVAL_MS;

/// Timer-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Display refresh interval while running; at most 1000 (>= 1 Hz).
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Scopes the persisted session, one active session per owner.
    #[serde(default = "default_session_owner")]
    pub session_owner: String,
}

/// Calendar configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// `"local"` or a fixed offset such as `"-03:00"`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_refresh_interval_ms() -> u64 {
    MAX_REFRESH_INTERVAL_MS
}
fn default_session_owner() -> String {
    "default".into()
}
fn default_utc_offset() -> String {
    "local".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            session_owner: default_session_owner(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

impl CalendarConfig {
    /// `None` means the machine's local timezone.
    pub fn offset_minutes(&self) -> Result<Option<i32>, ConfigError> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parses `local`, `+HH:MM`, `-HH:MM` or plain minutes (`-180`).
fn parse_utc_offset(value: &str) -> Result<Option<i32>, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidValue {
        key: "calendar.utc_offset".into(),
        message: format!("'{value}' is not 'local', '+HH:MM' or minutes"),
    };

    if value.eq_ignore_ascii_case("local") {
        return Ok(None);
    }
    let minutes = if let Some((h, m)) = value.split_once(':') {
        let (sign, hours) = match h.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, h.strip_prefix('+').unwrap_or(h)),
        };
        let hours = digits(hours).ok_or_else(invalid)?;
        let mins = digits(m).ok_or_else(invalid)?;
        if mins >= 60 {
            return Err(invalid());
        }
        let total = hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(mins))
            .and_then(|t| i32::try_from(t).ok())
            .ok_or_else(invalid)?;
        sign * total
    } else {
        value.parse::<i32>().map_err(|_| invalid())?
    };
    if minutes.unsigned_abs() > 14 * 60 {
        return Err(invalid());
    }
    Ok(Some(minutes))
}

/// Unsigned decimal with no sign prefix.
fn digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;
                let invalid = |message: String| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message,
                };

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) => {
                        return Err(invalid("cannot replace a whole section".into()))
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Reject values the rest of the system cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_REFRESH_INTERVAL_MS).contains(&self.timer.refresh_interval_ms) {
            return Err(ConfigError::InvalidValue {
                key: "timer.refresh_interval_ms".into(),
                message: format!("must be between 1 and {MAX_REFRESH_INTERVAL_MS}"),
            });
        }
        if self.timer.session_owner.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "timer.session_owner".into(),
                message: "must not be empty".into(),
            });
        }
        self.calendar.offset_minutes()?;
        Ok(())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::path()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(format!("{}: {e}", path.display())))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Call [`save`](Self::save) to
    /// persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid; the
    /// config is unchanged in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Offset used to decide "today"; falls back to local time if invalid.
    pub fn utc_offset_minutes(&self) -> Option<i32> {
        self.calendar.offset_minutes().ok().flatten()
    }
}
