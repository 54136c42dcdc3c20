//! Level catalogue

use crate::board::{BOARD_COLS, BOARD_ROWS, Obstacle};
use crate::mission::{Mission, MissionKind, StageUnlock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Level identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub String);

impl LevelId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub name: String,
    /// Starting tick interval in milliseconds, must be > 0
    pub starting_interval_ms: u64,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub missions: Vec<Mission>,
    /// Staged missions appended mid-round
    #[serde(default)]
    pub unlocks: Vec<StageUnlock>,
}

impl Level {
    pub fn starting_interval(&self) -> Duration {
        Duration::from_millis(self.starting_interval_ms)
    }

    /// Check the level's invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.starting_interval_ms == 0 {
            return Err(format!("level '{}' has a zero starting interval", self.id));
        }
        if let Some(obstacle) = self
            .obstacles
            .iter()
            .find(|o| o.row >= BOARD_ROWS || o.col >= BOARD_COLS)
        {
            return Err(format!(
                "level '{}' has an obstacle outside the board at ({}, {})",
                self.id, obstacle.row, obstacle.col
            ));
        }
        Ok(())
    }

    pub fn beginner() -> Self {
        Self {
            id: LevelId::new("beginner"),
            name: "Beginner".to_string(),
            starting_interval_ms: 800,
            obstacles: Vec::new(),
            missions: vec![
                Mission::new("b1_lines", MissionKind::LinesCleared, 5, "Clear 5 lines"),
                Mission::new("b2_score", MissionKind::ScoreThreshold, 500, "Reach 500 points"),
            ],
            unlocks: Vec::new(),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            id: LevelId::new("intermediate"),
            name: "Intermediate".to_string(),
            starting_interval_ms: 600,
            obstacles: staircase(BOARD_ROWS - 1, 3),
            missions: vec![
                Mission::new("i1_lines", MissionKind::LinesCleared, 10, "Clear 10 lines"),
                Mission::new("i2_score", MissionKind::ScoreThreshold, 1500, "Reach 1500 points"),
            ],
            unlocks: Vec::new(),
        }
    }

    pub fn expert() -> Self {
        Self {
            id: LevelId::new("expert"),
            name: "Expert".to_string(),
            starting_interval_ms: 400,
            obstacles: staircase(BOARD_ROWS - 1, 6),
            missions: vec![
                Mission::new("e1_lines", MissionKind::LinesCleared, 20, "Clear 20 lines"),
                Mission::new("e2_score", MissionKind::ScoreThreshold, 4000, "Reach 4000 points"),
                Mission::new("e3_survive", MissionKind::SurviveTime, 90, "Survive 90 seconds"),
            ],
            unlocks: Vec::new(),
        }
    }

    /// The level versus rooms are played on
    pub fn multiplayer() -> Self {
        Self {
            id: LevelId::new("multiplayer"),
            name: "Versus".to_string(),
            starting_interval_ms: 700,
            obstacles: Vec::new(),
            missions: vec![
                Mission::new("mm1_stage1_lines", MissionKind::LinesCleared, 10, "Clear 10 lines"),
                Mission::new("mm2_stage1_score", MissionKind::ScoreThreshold, 1000, "Reach 1000 points"),
            ],
            unlocks: vec![StageUnlock {
                after_stage: 1,
                mission: Mission::new("mm3_stage2_time", MissionKind::SurviveTime, 40, "Survive 40 seconds")
                    .in_stage(2),
            }],
        }
    }

    /// Built-in catalogue, in progression order
    pub fn all() -> Vec<Level> {
        vec![Self::beginner(), Self::intermediate(), Self::expert(), Self::multiplayer()]
    }
}

/// Find a level by id
pub fn find<'a>(levels: &'a [Level], id: &LevelId) -> Option<&'a Level> {
    levels.iter().find(|level| &level.id == id)
}

/// The level after `id` in the catalogue, if any
pub fn next_level<'a>(levels: &'a [Level], id: &LevelId) -> Option<&'a Level> {
    let idx = levels.iter().position(|level| &level.id == id)?;
    levels.get(idx + 1)
}

/// Ragged bottom rows: `height` rows, each missing one cell so they never
/// start out full
fn staircase(bottom: usize, height: usize) -> Vec<Obstacle> {
    (0..height)
        .flat_map(|step| {
            let row = bottom - step;
            let gap = (step * 3) % BOARD_COLS;
            (0..BOARD_COLS)
                .filter(move |&col| col != gap && (col + step) % 2 == 0)
                .map(move |col| Obstacle { row, col })
        })
        .collect()
}
