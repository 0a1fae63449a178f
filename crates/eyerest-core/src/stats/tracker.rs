//! Break and exercise counters with daily rollover and streaks.
//!
//! Day rollover is lazy: every read or write first calls [`Statistics::roll_over`]
//! with the current local date, which zeroes the daily counters once per
//! calendar-day transition.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::history::DailyHistory;
use crate::clock::to_datetime;
use crate::events::Event;
use crate::timer::COMPLETION_DEBOUNCE_MS;

/// Default window for [`Statistics::average_breaks_per_day`].
pub const AVERAGE_WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_breaks: u32,
    pub breaks_today: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Last calendar day with a recorded break.
    pub last_break_date: Option<NaiveDate>,
    /// Day the daily counters were last zeroed.
    pub last_reset_date: Option<NaiveDate>,
    /// Epoch ms of the last recorded break; debounce anchor.
    pub last_break_at: i64,
    pub exercises_completed: u32,
    pub exercises_today: u32,
    pub last_exercise_at: i64,
    pub daily_history: DailyHistory,
}

impl Statistics {
    /// Zero the daily counters if `today` differs from the last reset date.
    /// Returns true when a rollover happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.last_reset_date == Some(today) {
            return false;
        }
        self.breaks_today = 0;
        self.exercises_today = 0;
        self.last_reset_date = Some(today);
        true
    }

    /// Record one completed break.
    ///
    /// Returns `None` when the call lands within the debounce window of the
    /// previous break, in which case nothing but the rollover is applied.
    pub fn record_break_completed(&mut self, now: i64, today: NaiveDate) -> Option<Event> {
        self.roll_over(today);

        if self.last_break_at != 0 && now - self.last_break_at < COMPLETION_DEBOUNCE_MS {
            tracing::debug!(now, last = self.last_break_at, "break record debounced");
            return None;
        }

        self.total_breaks += 1;
        self.breaks_today += 1;
        self.last_break_at = now;

        if self.last_break_date != Some(today) {
            let yesterday = today.pred_opt();
            self.current_streak = match self.last_break_date {
                Some(last) if Some(last) == yesterday => self.current_streak + 1,
                _ => 1,
            };
            self.best_streak = self.best_streak.max(self.current_streak);
            self.last_break_date = Some(today);
        }

        self.daily_history.upsert(today, self.breaks_today);

        Some(Event::BreakRecorded {
            total_breaks: self.total_breaks,
            breaks_today: self.breaks_today,
            current_streak: self.current_streak,
            best_streak: self.best_streak,
            at: to_datetime(now),
        })
    }

    /// Record one guided eye exercise.
    pub fn record_exercise_completed(&mut self, now: i64, today: NaiveDate) -> Option<Event> {
        self.roll_over(today);

        if self.last_exercise_at != 0 && now - self.last_exercise_at < COMPLETION_DEBOUNCE_MS {
            return None;
        }

        self.exercises_completed += 1;
        self.exercises_today += 1;
        self.last_exercise_at = now;

        Some(Event::ExerciseRecorded {
            exercises_completed: self.exercises_completed,
            exercises_today: self.exercises_today,
            at: to_datetime(now),
        })
    }

    pub fn average_breaks_per_day(&self, window: usize) -> f64 {
        self.daily_history.average(window)
    }
}
