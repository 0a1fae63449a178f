//! Break timer state machine.
//!
//! The timer is wall-clock based and has no internal thread: remaining time
//! is always derived from `last_fired_at` and the interval, and the caller
//! is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> Completed -> Running (next cycle)
//! ```
//!
//! Every command takes the current time in epoch milliseconds and returns
//! `Some(Event)` when it changed something, `None` when it was a no-op.

use serde::{Deserialize, Serialize};

use crate::clock::to_datetime;
use crate::events::Event;

pub const DEFAULT_INTERVAL_MIN: u32 = 20;
pub const MIN_INTERVAL_MIN: u32 = 15;
pub const MAX_INTERVAL_MIN: u32 = 60;

/// How far ahead `pause_until` is pushed while paused.
pub const PAUSE_GUARD_MS: i64 = 24 * 60 * 60 * 1000;

/// Completions reported closer together than this are treated as one.
pub const COMPLETION_DEBOUNCE_MS: i64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Persisted break timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    /// Start of the current cycle (epoch ms). Zero until first started.
    pub last_fired_at: i64,
    pub interval_minutes: u32,
    /// While `> now` the timer is paused. Zero when not paused.
    pub pause_until: i64,
    /// Remaining time frozen at the moment of pausing.
    pub paused_remaining_ms: i64,
    pub completed: bool,
    /// When the last break-due event was reported (epoch ms).
    #[serde(default)]
    pub last_completed_at: i64,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MIN)
    }
}

impl TimerState {
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            last_fired_at: 0,
            interval_minutes: clamp_interval(interval_minutes),
            pause_until: 0,
            paused_remaining_ms: 0,
            completed: false,
            last_completed_at: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn interval_ms(&self) -> i64 {
        i64::from(self.interval_minutes) * 60_000
    }

    pub fn phase(&self, now: i64) -> TimerPhase {
        if self.completed {
            TimerPhase::Completed
        } else if self.pause_until > now {
            TimerPhase::Paused
        } else if self.last_fired_at == 0 {
            TimerPhase::Idle
        } else {
            TimerPhase::Running
        }
    }

    pub fn is_paused(&self, now: i64) -> bool {
        self.phase(now) == TimerPhase::Paused
    }

    pub fn remaining_ms(&self, now: i64) -> i64 {
        match self.phase(now) {
            TimerPhase::Idle => self.interval_ms(),
            TimerPhase::Paused => self.paused_remaining_ms.max(0),
            TimerPhase::Completed => 0,
            TimerPhase::Running => {
                (self.last_fired_at + self.interval_ms() - now).max(0)
            }
        }
    }

    /// 0.0 .. 1.0 progress within the current cycle.
    pub fn progress(&self, now: i64) -> f64 {
        let total = self.interval_ms();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms(now) as f64 / total as f64)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// First run: begin the first cycle.
    pub fn start(&mut self, now: i64) -> Option<Event> {
        if self.phase(now) != TimerPhase::Idle {
            return None;
        }
        self.begin_cycle(now);
        Some(Event::TimerStarted {
            interval_minutes: self.interval_minutes,
            at: to_datetime(now),
        })
    }

    /// Call periodically. Returns `Some(Event::BreakDue)` once per cycle
    /// when the remaining time reaches zero.
    pub fn tick(&mut self, now: i64) -> Option<Event> {
        if self.pause_until != 0 && self.pause_until <= now {
            // Pause guard lapsed without a resume; the frozen time is gone.
            tracing::debug!(pause_until = self.pause_until, "pause guard lapsed");
            self.clear_pause();
        }

        if self.phase(now) != TimerPhase::Running || self.remaining_ms(now) > 0 {
            return None;
        }

        self.completed = true;
        if self.last_completed_at != 0
            && now - self.last_completed_at < COMPLETION_DEBOUNCE_MS
        {
            tracing::debug!(now, last = self.last_completed_at, "completion debounced");
            return None;
        }
        self.last_completed_at = now;
        Some(Event::BreakDue {
            interval_minutes: self.interval_minutes,
            at: to_datetime(now),
        })
    }

    pub fn pause(&mut self, now: i64) -> Option<Event> {
        if self.phase(now) != TimerPhase::Running {
            return None;
        }
        self.paused_remaining_ms = self.remaining_ms(now);
        self.pause_until = now + PAUSE_GUARD_MS;
        Some(Event::TimerPaused {
            remaining_ms: self.paused_remaining_ms,
            at: to_datetime(now),
        })
    }

    pub fn resume(&mut self, now: i64) -> Option<Event> {
        if self.phase(now) != TimerPhase::Paused {
            return None;
        }
        let remaining = self.paused_remaining_ms.min(self.interval_ms());
        if remaining <= 0 {
            self.last_fired_at = now;
        } else {
            self.last_fired_at = now - (self.interval_ms() - remaining);
        }
        self.clear_pause();
        Some(Event::TimerResumed {
            remaining_ms: self.remaining_ms(now),
            at: to_datetime(now),
        })
    }

    /// Restart the cycle immediately from any phase.
    pub fn reset(&mut self, now: i64) -> Option<Event> {
        self.begin_cycle(now);
        Some(Event::TimerReset { at: to_datetime(now) })
    }

    /// Acknowledge a completed cycle and arm the next one.
    pub fn start_next(&mut self, now: i64) -> Option<Event> {
        if self.phase(now) != TimerPhase::Completed {
            return None;
        }
        self.begin_cycle(now);
        Some(Event::TimerStarted {
            interval_minutes: self.interval_minutes,
            at: to_datetime(now),
        })
    }

    /// Change the cycle length. A paused timer keeps its frozen time,
    /// capped at the new interval.
    pub fn set_interval(&mut self, minutes: u32) {
        self.interval_minutes = clamp_interval(minutes);
        self.paused_remaining_ms = self.paused_remaining_ms.min(self.interval_ms());
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_cycle(&mut self, now: i64) {
        self.last_fired_at = now;
        self.completed = false;
        self.clear_pause();
    }

    fn clear_pause(&mut self) {
        self.pause_until = 0;
        self.paused_remaining_ms = 0;
    }
}

pub fn clamp_interval(minutes: u32) -> u32 {
    minutes.clamp(MIN_INTERVAL_MIN, MAX_INTERVAL_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: i64 = 60_000;
    const T0: i64 = 1_700_000_000_000;

    fn running(interval: u32) -> TimerState {
        let mut timer = TimerState::new(interval);
        timer.start(T0);
        timer
    }

    #[test]
    fn new_timer_is_idle_with_full_interval() {
        let timer = TimerState::default();
        assert_eq!(timer.phase(T0), TimerPhase::Idle);
        assert_eq!(timer.remaining_ms(T0), 20 * MIN);
    }

    #[test]
    fn start_only_from_idle() {
        let mut timer = running(20);
        assert_eq!(timer.phase(T0), TimerPhase::Running);
        assert!(timer.start(T0 + 1).is_none());
        assert_eq!(timer.last_fired_at, T0);
    }

    #[test]
    fn pause_freezes_remaining() {
        let mut timer = running(20);
        assert!(timer.pause(T0 + 5 * MIN).is_some());
        assert_eq!(timer.phase(T0 + 10 * MIN), TimerPhase::Paused);
        assert_eq!(timer.remaining_ms(T0 + 10 * MIN), 15 * MIN);
    }

    #[test]
    fn pause_is_idempotent() {
        let mut timer = running(20);
        timer.pause(T0 + MIN);
        let before = timer.clone();
        assert!(timer.pause(T0 + 2 * MIN).is_none());
        assert_eq!(timer, before);
    }

    #[test]
    fn resume_requires_paused() {
        let mut timer = running(20);
        assert!(timer.resume(T0 + MIN).is_none());
        assert_eq!(timer.last_fired_at, T0);
    }

    #[test]
    fn resume_with_no_remaining_restarts_full_cycle() {
        let mut timer = running(20);
        timer.pause(T0 + MIN);
        timer.paused_remaining_ms = 0;
        timer.resume(T0 + 2 * MIN);
        assert_eq!(timer.remaining_ms(T0 + 2 * MIN), 20 * MIN);
    }

    #[test]
    fn tick_completes_once() {
        let mut timer = running(20);
        assert!(timer.tick(T0 + 19 * MIN).is_none());
        assert!(matches!(
            timer.tick(T0 + 20 * MIN),
            Some(Event::BreakDue { .. })
        ));
        assert_eq!(timer.phase(T0 + 20 * MIN), TimerPhase::Completed);
        assert!(timer.tick(T0 + 21 * MIN).is_none());
        assert!(timer.tick(T0 + 90 * MIN).is_none());
    }

    #[test]
    fn completion_within_debounce_window_is_suppressed() {
        let mut timer = running(20);
        assert!(timer.tick(T0 + 20 * MIN).is_some());
        // Simulate a re-entrant fire: the cycle is re-armed and completes
        // again within 30 seconds of the previous report.
        timer.completed = false;
        timer.last_fired_at = T0 + 20 * MIN - timer.interval_ms();
        assert!(timer.tick(T0 + 20 * MIN + 10_000).is_none());
        assert!(timer.completed);
    }

    #[test]
    fn start_next_only_from_completed() {
        let mut timer = running(20);
        assert!(timer.start_next(T0 + MIN).is_none());
        timer.tick(T0 + 20 * MIN);
        assert!(timer.start_next(T0 + 25 * MIN).is_some());
        assert_eq!(timer.phase(T0 + 25 * MIN), TimerPhase::Running);
        assert_eq!(timer.remaining_ms(T0 + 25 * MIN), 20 * MIN);
    }

    #[test]
    fn reset_discards_progress_from_any_phase() {
        let mut timer = running(20);
        timer.pause(T0 + 10 * MIN);
        timer.reset(T0 + 11 * MIN);
        assert_eq!(timer.phase(T0 + 11 * MIN), TimerPhase::Running);
        assert_eq!(timer.remaining_ms(T0 + 11 * MIN), 20 * MIN);
        assert_eq!(timer.pause_until, 0);

        let mut idle = TimerState::default();
        idle.reset(T0);
        assert_eq!(idle.phase(T0), TimerPhase::Running);
    }

    #[test]
    fn lapsed_pause_guard_completes_cycle() {
        let mut timer = running(20);
        timer.pause(T0 + MIN);
        let after_guard = T0 + MIN + PAUSE_GUARD_MS;
        assert!(timer.tick(after_guard).is_some());
        assert_eq!(timer.pause_until, 0);
        assert_eq!(timer.phase(after_guard), TimerPhase::Completed);
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(TimerState::new(5).interval_minutes, MIN_INTERVAL_MIN);
        assert_eq!(TimerState::new(90).interval_minutes, MAX_INTERVAL_MIN);
        let mut timer = running(60);
        timer.pause(T0 + MIN);
        timer.set_interval(15);
        assert_eq!(timer.paused_remaining_ms, 15 * MIN);
    }

    #[test]
    fn pause_resume_scenario() {
        let mut timer = TimerState::new(20);
        timer.start(T0);
        let pause_at = T0 + 19 * MIN + 59_000;
        timer.pause(pause_at);
        assert_eq!(timer.remaining_ms(pause_at), 1_000);

        let resume_at = T0 + 25 * MIN;
        timer.resume(resume_at);
        assert_eq!(timer.remaining_ms(resume_at), 1_000);

        let tick_at = resume_at + 1_000;
        assert!(matches!(timer.tick(tick_at), Some(Event::BreakDue { .. })));
        assert_eq!(timer.remaining_ms(tick_at), 0);
        assert!(timer.tick(tick_at + 1_000).is_none());
    }

    proptest! {
        #[test]
        fn remaining_after_fresh_start(interval in 15u32..=60, frac in 0.0f64..=1.0) {
            let mut timer = TimerState::new(interval);
            timer.start(T0);
            let t = (timer.interval_ms() as f64 * frac) as i64;
            prop_assert_eq!(timer.remaining_ms(T0 + t), timer.interval_ms() - t);
        }

        #[test]
        fn pause_resume_round_trip(interval in 15u32..=60, elapsed in 0i64..3_600_000) {
            let mut timer = TimerState::new(interval);
            timer.start(T0);
            let now = T0 + elapsed.min(timer.interval_ms() - 1);
            let before = timer.remaining_ms(now);
            timer.pause(now);
            timer.resume(now);
            prop_assert_eq!(timer.remaining_ms(now), before);
        }
    }
}
