//! Scoring and drop speed

use std::time::Duration;

/// Default lower bound for the tick interval
pub const DEFAULT_TICK_FLOOR: Duration = Duration::from_millis(100);
/// Default multiplier applied to the tick interval after a clear
pub const DEFAULT_SPEEDUP: f64 = 0.95;

/// Points for clearing `lines` rows with a single commit.
///
/// Clearing several rows at once is worth more than clearing them one by one.
pub fn points_for(lines: usize) -> u64 {
    match lines {
        0 => 0,
        1 => 100,
        2 => 300,
        3 => 500,
        4 => 800,
        n => 200 * n as u64,
    }
}

/// Speed curve: how the tick interval shrinks after each clear
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCurve {
    pub factor: f64,
    pub floor: Duration,
}

impl Default for SpeedCurve {
    fn default() -> Self {
        Self {
            factor: DEFAULT_SPEEDUP,
            floor: DEFAULT_TICK_FLOOR,
        }
    }
}

impl SpeedCurve {
    /// Next tick interval after a clear. Never goes below the floor and
    /// never slows down an interval that is already at or under it.
    pub fn next_interval(&self, current: Duration) -> Duration {
        if current <= self.floor {
            return current;
        }
        current.mul_f64(self.factor).max(self.floor)
    }
}

/// Score tracking for one round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    /// Current score
    pub points: u64,
    /// Total lines cleared this round
    pub lines: u32,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit that cleared `lines` rows, returning the points added
    pub fn add_clear(&mut self, lines: usize) -> u64 {
        let gained = points_for(lines);
        self.points += gained;
        self.lines += lines as u32;
        gained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_clear() {
        let mut score = Score::new();
        assert_eq!(score.add_clear(1), 100);
        assert_eq!(score.points, 100);
        assert_eq!(score.lines, 1);
    }

    #[test]
    fn test_no_clear_scores_nothing() {
        let mut score = Score::new();
        assert_eq!(score.add_clear(0), 0);
        assert_eq!(score, Score::new());
    }

    #[test]
    fn test_speed_reduces_by_five_percent() {
        let curve = SpeedCurve::default();
        let next = curve.next_interval(Duration::from_millis(1000));
        let expected = Duration::from_millis(950);
        assert!(next.abs_diff(expected) < Duration::from_micros(1), "got {next:?}");
    }

    #[test]
    fn test_speed_below_floor_is_untouched() {
        let curve = SpeedCurve::default();
        let slow = Duration::from_millis(80);
        assert_eq!(curve.next_interval(slow), slow);
    }

    proptest! {
        #[test]
        fn prop_multi_line_bonus_is_super_linear(k in 2usize..=8) {
            prop_assert!(points_for(k) > k as u64 * points_for(1));
        }

        #[test]
        fn prop_speed_never_below_floor(start_ms in 100u64..5000, clears in 0usize..500) {
            let curve = SpeedCurve::default();
            let mut interval = Duration::from_millis(start_ms);
            for _ in 0..clears {
                let next = curve.next_interval(interval);
                prop_assert!(next <= interval);
                interval = next;
            }
            prop_assert!(interval >= curve.floor);
        }
    }
}
