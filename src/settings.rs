//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/tetrs-rooms/settings.toml (or platform equivalent)

use crate::level::{Level, LevelId};
use crate::score::{DEFAULT_SPEEDUP, DEFAULT_TICK_FLOOR, SpeedCurve};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Entries kept per level
const MAX_SCORES: usize = 10;

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gameplay settings
    pub gameplay: GameplaySettings,
    /// Level catalogue, in progression order
    pub levels: Vec<Level>,
    /// High scores
    pub high_scores: HighScores,
}

/// Gameplay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Lower bound for the tick interval in milliseconds
    pub tick_floor_ms: u64,
    /// Multiplier applied to the tick interval on every clear
    pub speedup_factor: f64,
    /// Shapes generated for each versus room
    pub sequence_length: usize,
}

/// High scores, keyed by level id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HighScores {
    pub levels: BTreeMap<String, Vec<ScoreEntry>>,
}

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub score: u64,
    /// Whether every mission was completed
    pub completed: bool,
    /// Date as ISO string
    pub date: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gameplay: GameplaySettings::default(),
            levels: Level::all(),
            high_scores: HighScores::default(),
        }
    }
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            tick_floor_ms: DEFAULT_TICK_FLOOR.as_millis() as u64,
            speedup_factor: DEFAULT_SPEEDUP,
            sequence_length: 1000,
        }
    }
}

impl GameplaySettings {
    /// Speed curve with out-of-range values replaced by defaults
    pub fn speed_curve(&self) -> SpeedCurve {
        let factor = if self.speedup_factor > 0.0 && self.speedup_factor <= 1.0 {
            self.speedup_factor
        } else {
            warn!("Ignoring speedup factor {}", self.speedup_factor);
            DEFAULT_SPEEDUP
        };
        let floor = match self.tick_floor_ms {
            0 => DEFAULT_TICK_FLOOR,
            ms => Duration::from_millis(ms),
        };
        SpeedCurve { factor, floor }
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "tetrs-rooms", "tetrs-rooms").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from file, or create default
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => Self::default(),
        }
    }

    /// Parse settings text, falling back to defaults on error
    pub fn parse(contents: &str) -> Self {
        let mut settings: Settings = match toml::from_str(contents) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid settings file, using defaults: {}", e);
                Self::default()
            }
        };
        settings.sanitize_levels();
        settings
    }

    /// Drop invalid levels. An empty catalogue falls back to the built-in one.
    fn sanitize_levels(&mut self) {
        self.levels.retain(|level| match level.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping level: {}", e);
                false
            }
        });
        if self.levels.is_empty() {
            self.levels = Level::all();
        }
    }

    /// Save settings to file
    pub fn save(&self) -> Result<(), String> {
        let Some(dir) = Self::config_dir() else {
            return Err("Could not determine config directory".to_string());
        };

        let Some(path) = Self::settings_path() else {
            return Err("Could not determine settings path".to_string());
        };

        fs::create_dir_all(&dir).map_err(|e| format!("Failed to create config dir: {}", e))?;

        let contents = toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize: {}", e))?;

        fs::write(&path, contents).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(())
    }

    pub fn level(&self, id: &LevelId) -> Option<&Level> {
        crate::level::find(&self.levels, id)
    }

    /// Record a finished round's score for a level
    pub fn add_score(&mut self, level: &LevelId, score: u64, completed: bool) {
        let entries = self.high_scores.levels.entry(level.to_string()).or_default();
        entries.push(ScoreEntry {
            score,
            completed,
            date: today(),
        });
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(MAX_SCORES);
    }

    /// Get the best score for a level
    pub fn best_for(&self, level: &LevelId) -> Option<u64> {
        self.high_scores
            .levels
            .get(level.as_str())
            .and_then(|entries| entries.first())
            .map(|e| e.score)
    }
}

/// Today's UTC date as YYYY-MM-DD
fn today() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    format!("{:04}-{:02}-{:02}", y, m, d)
}

/// Days since 1970-01-01 to a proleptic Gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
