//! Pausable timers driving a round
//!
//! A [`Timer`] is either idle, armed with a deadline, or frozen with the time
//! that was left when it was paused. The runner sleeps until the earliest
//! armed deadline; time comes from `tokio::time` so tests can pause it.

use tokio::time::{Duration, Instant};

/// Survival countdown granularity
pub const SURVIVAL_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
    /// Remaining time captured on freeze
    frozen: Option<Duration>,
}

impl Timer {
    /// Fire `after` from `now`, replacing any previous schedule
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
        self.frozen = None;
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
        self.frozen = None;
    }

    /// Deadline to sleep until, `None` when idle or frozen
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Armed or frozen
    pub fn is_set(&self) -> bool {
        self.deadline.is_some() || self.frozen.is_some()
    }

    /// Remaining time while frozen
    pub fn frozen(&self) -> Option<Duration> {
        self.frozen
    }

    /// Stop the clock, keeping what was left
    pub fn freeze(&mut self, now: Instant) {
        if let Some(deadline) = self.deadline.take() {
            self.frozen = Some(deadline.saturating_duration_since(now));
        }
    }

    /// Restart the clock with the time left at freeze
    pub fn thaw(&mut self, now: Instant) {
        if let Some(remaining) = self.frozen.take() {
            self.deadline = Some(now + remaining);
        }
    }
}

/// The two timers of a round: gravity ticks and the survival countdown
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pub tick: Timer,
    pub survival: Timer,
    paused: bool,
}

impl Scheduler {
    /// First tick one interval from `now`
    pub fn start(now: Instant, interval: Duration) -> Self {
        let mut scheduler = Self::default();
        scheduler.tick.arm(now, interval);
        scheduler
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.tick.freeze(now);
        self.survival.freeze(now);
    }

    pub fn resume(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.tick.thaw(now);
        self.survival.thaw(now);
    }

    /// Keep the survival timer in step with whether a countdown is running.
    /// A newly active countdown starts a fresh one-second step.
    pub fn sync_survival(&mut self, now: Instant, active: bool) {
        if !active {
            self.survival.disarm();
        } else if !self.survival.is_set() && !self.paused {
            self.survival.arm(now, SURVIVAL_STEP);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freeze_keeps_remaining() {
        let start = Instant::now();
        let mut timer = Timer::default();
        timer.arm(start, Duration::from_millis(500));
        timer.freeze(start + Duration::from_millis(200));
        assert_eq!(timer.deadline(), None);
        assert_eq!(timer.frozen(), Some(Duration::from_millis(300)));

        let later = start + Duration::from_secs(60);
        timer.thaw(later);
        assert_eq!(timer.deadline(), Some(later + Duration::from_millis(300)));
    }

    #[test]
    fn test_freeze_past_deadline_is_zero() {
        let start = Instant::now();
        let mut timer = Timer::default();
        timer.arm(start, Duration::from_millis(10));
        timer.freeze(start + Duration::from_secs(1));
        assert_eq!(timer.frozen(), Some(Duration::ZERO));
    }

    #[test]
    fn test_idle_timer_ignores_freeze() {
        let now = Instant::now();
        let mut timer = Timer::default();
        timer.freeze(now);
        timer.thaw(now);
        assert!(!timer.is_set());
    }

    #[test]
    fn test_survival_not_armed_while_paused() {
        let now = Instant::now();
        let mut scheduler = Scheduler::start(now, Duration::from_millis(500));
        scheduler.pause(now);
        scheduler.sync_survival(now, true);
        assert!(!scheduler.survival.is_set());
        scheduler.resume(now);
        scheduler.sync_survival(now, true);
        assert_eq!(scheduler.survival.deadline(), Some(now + SURVIVAL_STEP));
        scheduler.sync_survival(now, false);
        assert!(!scheduler.survival.is_set());
    }
}
