//! Daemon configuration: `ROLLCALL_*` environment variables plus an
//! optional TOML timetable file.

use chrono::NaiveTime;
use rollcall_core::{BlockKind, ReminderSchedule, ScheduleBlock, MATCH_DISTANCE_THRESHOLD};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read timetable {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timetable parse failed: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("invalid block kind {0:?}, expected \"class\" or \"break\"")]
    InvalidKind(String),
    #[error("timetable has no blocks")]
    Empty,
}

pub struct Config {
    /// Path to the SQLite roster database.
    pub db_path: PathBuf,
    /// Wall-clock tick cadence for window rollover and reminders.
    pub tick_interval: Duration,
    /// Euclidean distance threshold for a positive identification.
    pub match_threshold: f32,
    /// Optional TOML timetable overriding the built-in standard day.
    pub timetable_path: Option<PathBuf>,
    /// Whether to post desktop notifications for alerts and reminders.
    pub desktop_notify: bool,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("roster.db"));

        Self {
            db_path,
            tick_interval: Duration::from_millis(env_u64("ROLLCALL_TICK_MS", 1000)),
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", MATCH_DISTANCE_THRESHOLD),
            timetable_path: std::env::var("ROLLCALL_TIMETABLE").ok().map(PathBuf::from),
            desktop_notify: std::env::var("ROLLCALL_DESKTOP_NOTIFY")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    /// Build the reminder schedule: the configured timetable when present,
    /// the standard school day otherwise.
    pub fn load_schedule(&self) -> Result<ReminderSchedule, ConfigError> {
        match &self.timetable_path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                let blocks = parse_timetable(&text)?;
                tracing::info!(path = %path.display(), blocks = blocks.len(), "timetable loaded");
                Ok(ReminderSchedule::new(blocks))
            }
            None => Ok(ReminderSchedule::standard()),
        }
    }
}

#[derive(Deserialize)]
struct TimetableFile {
    #[serde(default)]
    block: Vec<RawBlock>,
}

#[derive(Deserialize)]
struct RawBlock {
    start: String,
    end: String,
    kind: String,
}

/// Parse a `[[block]]` timetable document.
pub fn parse_timetable(text: &str) -> Result<Vec<ScheduleBlock>, ConfigError> {
    let file: TimetableFile = toml::from_str(text)?;
    if file.block.is_empty() {
        return Err(ConfigError::Empty);
    }
    file.block
        .iter()
        .map(|raw| {
            Ok(ScheduleBlock::new(
                parse_hm(&raw.start)?,
                parse_hm(&raw.end)?,
                parse_kind(&raw.kind)?,
            ))
        })
        .collect()
}

fn parse_hm(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(value.to_string()))
}

fn parse_kind(value: &str) -> Result<BlockKind, ConfigError> {
    match value {
        "class" => Ok(BlockKind::Class),
        "break" => Ok(BlockKind::Break),
        other => Err(ConfigError::InvalidKind(other.to_string())),
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timetable() {
        let text = r#"
            [[block]]
            start = "09:00"
            end = "10:00"
            kind = "class"

            [[block]]
            start = "10:00"
            end = "10:15"
            kind = "break"
        "#;
        let blocks = parse_timetable(text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Class);
        assert_eq!(blocks[1].kind, BlockKind::Break);
        assert_eq!(blocks[0].start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn test_bad_time_rejected() {
        let text = r#"
            [[block]]
            start = "9 o'clock"
            end = "10:00"
            kind = "class"
        "#;
        assert!(matches!(
            parse_timetable(text),
            Err(ConfigError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_bad_kind_rejected() {
        let text = r#"
            [[block]]
            start = "09:00"
            end = "10:00"
            kind = "lunch"
        "#;
        assert!(matches!(
            parse_timetable(text),
            Err(ConfigError::InvalidKind(_))
        ));
    }

    #[test]
    fn test_empty_timetable_rejected() {
        assert!(matches!(parse_timetable(""), Err(ConfigError::Empty)));
    }
}
