//! Missions: per-round objectives with staged unlocks and a survival countdown
//!
//! A [`MissionRegistry`] owns the round's mission list. Progress events
//! (`on_lines_cleared`, `on_score`, `tick_survival`) complete missions, then
//! the unlock table is evaluated so staged missions are appended in one place.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What a mission measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    /// Total lines cleared this round reaches the target
    LinesCleared,
    /// Score reaches the target
    ScoreThreshold,
    /// Stay alive for `target` seconds once the mission is active
    SurviveTime,
}

/// A single objective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub kind: MissionKind,
    pub target: u64,
    pub description: String,
    /// Stage tag, base missions are stage 1
    #[serde(default = "default_stage")]
    pub stage: u8,
    #[serde(default)]
    pub completed: bool,
}

fn default_stage() -> u8 {
    1
}

impl Mission {
    pub fn new(id: &str, kind: MissionKind, target: u64, description: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            target,
            description: description.to_string(),
            stage: 1,
            completed: false,
        }
    }

    /// Tag this mission with a stage
    pub fn in_stage(mut self, stage: u8) -> Self {
        self.stage = stage;
        self
    }

    /// Mark as completed. Returns true only on the pending -> completed edge.
    fn complete(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        info!("Mission '{}' completed", self.id);
        true
    }
}

/// Rule: once every mission of `after_stage` is completed, append `mission`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUnlock {
    pub after_stage: u8,
    pub mission: Mission,
}

/// Running survival countdown
#[derive(Debug, Clone, PartialEq, Eq)]
struct Survival {
    mission_id: String,
    remaining: u64,
}

/// The round's missions plus the unlock rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionRegistry {
    missions: Vec<Mission>,
    unlocks: Vec<StageUnlock>,
    survival: Option<Survival>,
}

impl MissionRegistry {
    /// Start a round from a level's base missions and unlock rules
    pub fn new(base: &[Mission], unlocks: &[StageUnlock]) -> Self {
        let mut registry = Self {
            missions: base
                .iter()
                .cloned()
                .map(|mut mission| {
                    mission.completed = false;
                    mission
                })
                .collect(),
            unlocks: unlocks.to_vec(),
            survival: None,
        };
        registry.after_progress();
        registry
    }

    /// Rebuild a registry whose progress is only known through score and
    /// line totals (restoring a round from a snapshot)
    pub fn restored(base: &[Mission], unlocks: &[StageUnlock], points: u64, lines: u32) -> Self {
        let mut registry = Self::new(base, unlocks);
        registry.on_lines_cleared(0, lines);
        registry.on_score(points);
        registry
    }

    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    /// Seconds left on the running survival countdown, if any
    pub fn survival_remaining(&self) -> Option<u64> {
        self.survival.as_ref().map(|s| s.remaining)
    }

    /// Whether every currently known mission is completed
    pub fn all_completed(&self) -> bool {
        self.missions.iter().all(|m| m.completed)
    }

    /// Advance line-count missions against the round total
    pub fn on_lines_cleared(&mut self, lines_this_event: usize, total_lines: u32) {
        if lines_this_event > 0 {
            debug!("Cleared {} lines ({} total)", lines_this_event, total_lines);
        }
        for mission in &mut self.missions {
            if mission.kind == MissionKind::LinesCleared && u64::from(total_lines) >= mission.target {
                mission.complete();
            }
        }
        self.after_progress();
    }

    /// Advance score-threshold missions
    pub fn on_score(&mut self, score: u64) {
        for mission in &mut self.missions {
            if mission.kind == MissionKind::ScoreThreshold && score >= mission.target {
                mission.complete();
            }
        }
        self.after_progress();
    }

    /// One real-time second elapsed on the survival countdown.
    /// Returns true if this completed the survival mission.
    pub fn tick_survival(&mut self) -> bool {
        let Some(survival) = &mut self.survival else {
            return false;
        };
        survival.remaining = survival.remaining.saturating_sub(1);
        if survival.remaining > 0 {
            return false;
        }

        let id = survival.mission_id.clone();
        self.survival = None;
        let completed = self
            .missions
            .iter_mut()
            .find(|m| m.id == id)
            .is_some_and(|m| m.complete());
        self.after_progress();
        completed
    }

    /// Apply unlock rules and (re)arm the survival countdown
    fn after_progress(&mut self) {
        // An unlocked mission may itself be instantly done
        while self.complete_instant_survival() | self.apply_unlocks() {}
        self.arm_survival();
    }

    /// Zero-second survival missions have nothing to count down
    fn complete_instant_survival(&mut self) -> bool {
        let mut changed = false;
        for mission in &mut self.missions {
            if mission.kind == MissionKind::SurviveTime && mission.target == 0 {
                changed |= mission.complete();
            }
        }
        changed
    }

    /// Returns true if any mission was appended
    fn apply_unlocks(&mut self) -> bool {
        let mut appended = false;
        for rule in &self.unlocks {
            if self.missions.iter().any(|m| m.id == rule.mission.id) {
                continue;
            }
            let mut prerequisites = self
                .missions
                .iter()
                .filter(|m| m.stage == rule.after_stage)
                .peekable();
            // A rule whose stage has no missions can never be satisfied
            if prerequisites.peek().is_none() {
                continue;
            }
            if prerequisites.all(|m| m.completed) {
                info!("Unlocked stage {} mission '{}'", rule.mission.stage, rule.mission.id);
                let mut mission = rule.mission.clone();
                mission.completed = false;
                self.missions.push(mission);
                appended = true;
            }
        }
        appended
    }

    fn arm_survival(&mut self) {
        if self.survival.is_some() {
            return;
        }
        let pending = self
            .missions
            .iter()
            .find(|m| m.kind == MissionKind::SurviveTime && !m.completed);
        if let Some(mission) = pending {
            debug!("Survival countdown started: {}s for '{}'", mission.target, mission.id);
            self.survival = Some(Survival {
                mission_id: mission.id.clone(),
                remaining: mission.target,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged() -> MissionRegistry {
        MissionRegistry::new(
            &[
                Mission::new("lines", MissionKind::LinesCleared, 10, "Clear 10 lines"),
                Mission::new("score", MissionKind::ScoreThreshold, 1000, "Reach 1000 points"),
            ],
            &[StageUnlock {
                after_stage: 1,
                mission: Mission::new("survive", MissionKind::SurviveTime, 3, "Survive 3 seconds").in_stage(2),
            }],
        )
    }

    #[test]
    fn test_lines_mission_uses_cumulative_total() {
        let mut registry = staged();
        registry.on_lines_cleared(4, 8);
        assert!(!registry.missions()[0].completed);
        registry.on_lines_cleared(2, 10);
        assert!(registry.missions()[0].completed);
    }

    #[test]
    fn test_score_mission_meets_or_exceeds() {
        let mut registry = staged();
        registry.on_score(999);
        assert!(!registry.missions()[1].completed);
        registry.on_score(1000);
        assert!(registry.missions()[1].completed);
    }

    #[test]
    fn test_stage_two_appended_after_stage_one() {
        let mut registry = staged();
        registry.on_lines_cleared(10, 10);
        assert_eq!(registry.missions().len(), 2);
        registry.on_score(1200);
        assert_eq!(registry.missions().len(), 3);
        assert_eq!(registry.missions()[2].id, "survive");
        assert_eq!(registry.survival_remaining(), Some(3));
        assert!(!registry.all_completed());
    }

    #[test]
    fn test_stage_two_appended_once() {
        let mut registry = staged();
        registry.on_lines_cleared(10, 10);
        for _ in 0..5 {
            registry.on_score(5000);
            registry.on_lines_cleared(1, 11);
        }
        let count = registry.missions().iter().filter(|m| m.id == "survive").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_survival_countdown_completes_mission() {
        let mut registry = staged();
        registry.on_lines_cleared(10, 10);
        registry.on_score(1000);

        assert!(!registry.tick_survival());
        assert!(!registry.tick_survival());
        assert_eq!(registry.survival_remaining(), Some(1));
        assert!(registry.tick_survival());
        assert_eq!(registry.survival_remaining(), None);
        assert!(registry.all_completed());

        // Countdown is gone, further ticks are no-ops
        assert!(!registry.tick_survival());
    }

    #[test]
    fn test_completed_never_reverts() {
        let mut registry = staged();
        registry.on_score(1000);
        registry.on_score(0);
        registry.on_lines_cleared(0, 0);
        assert!(registry.missions()[1].completed);
    }

    #[test]
    fn test_rule_for_empty_stage_is_ignored() {
        let registry = MissionRegistry::new(
            &[],
            &[StageUnlock {
                after_stage: 1,
                mission: Mission::new("late", MissionKind::ScoreThreshold, 1, "Late").in_stage(2),
            }],
        );
        assert!(registry.missions().is_empty());
    }

    #[test]
    fn test_base_survival_mission_arms_immediately() {
        let registry = MissionRegistry::new(
            &[Mission::new("alive", MissionKind::SurviveTime, 30, "Survive 30 seconds")],
            &[],
        );
        assert_eq!(registry.survival_remaining(), Some(30));
    }

    #[test]
    fn test_zero_second_survival_completes_at_once() {
        let registry = MissionRegistry::new(
            &[
                Mission::new("instant", MissionKind::SurviveTime, 0, "Survive 0 seconds"),
                Mission::new("alive", MissionKind::SurviveTime, 5, "Survive 5 seconds"),
            ],
            &[],
        );
        assert!(registry.missions()[0].completed);
        assert_eq!(registry.survival_remaining(), Some(5));
    }

    #[test]
    fn test_zero_second_unlock_chains_to_next_stage() {
        let mut registry = MissionRegistry::new(
            &[Mission::new("score", MissionKind::ScoreThreshold, 100, "Reach 100 points")],
            &[
                StageUnlock {
                    after_stage: 1,
                    mission: Mission::new("instant", MissionKind::SurviveTime, 0, "Survive 0 seconds").in_stage(2),
                },
                StageUnlock {
                    after_stage: 2,
                    mission: Mission::new("alive", MissionKind::SurviveTime, 4, "Survive 4 seconds").in_stage(3),
                },
            ],
        );
        registry.on_score(100);
        assert_eq!(registry.missions().len(), 3);
        assert!(registry.missions()[1].completed);
        assert_eq!(registry.survival_remaining(), Some(4));
    }

    #[test]
    fn test_restored_replays_totals() {
        let base = [
            Mission::new("lines", MissionKind::LinesCleared, 10, "Clear 10 lines"),
            Mission::new("score", MissionKind::ScoreThreshold, 1000, "Reach 1000 points"),
        ];
        let registry = MissionRegistry::restored(&base, &[], 1500, 3);
        assert!(!registry.missions()[0].completed);
        assert!(registry.missions()[1].completed);
    }
}
