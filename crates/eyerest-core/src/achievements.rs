//! Achievement thresholds over usage statistics.
//!
//! Unlocks are union-only: once an id is in the set it is never evaluated
//! again and never removed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::clock::to_datetime;
use crate::events::Event;
use crate::stats::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstBreak,
    TenBreaks,
    FiftyBreaks,
    HundredBreaks,
    FiveHundredBreaks,
    ThreeDayStreak,
    WeekStreak,
    MonthStreak,
    FirstExercise,
    TwentyFiveExercises,
}

impl AchievementId {
    pub const ALL: [AchievementId; 10] = [
        AchievementId::FirstBreak,
        AchievementId::TenBreaks,
        AchievementId::FiftyBreaks,
        AchievementId::HundredBreaks,
        AchievementId::FiveHundredBreaks,
        AchievementId::ThreeDayStreak,
        AchievementId::WeekStreak,
        AchievementId::MonthStreak,
        AchievementId::FirstExercise,
        AchievementId::TwentyFiveExercises,
    ];

    /// Whether the statistics meet this achievement's threshold.
    pub fn is_met(&self, stats: &Statistics) -> bool {
        match self {
            AchievementId::FirstBreak => stats.total_breaks >= 1,
            AchievementId::TenBreaks => stats.total_breaks >= 10,
            AchievementId::FiftyBreaks => stats.total_breaks >= 50,
            AchievementId::HundredBreaks => stats.total_breaks >= 100,
            AchievementId::FiveHundredBreaks => stats.total_breaks >= 500,
            AchievementId::ThreeDayStreak => stats.best_streak >= 3,
            AchievementId::WeekStreak => stats.best_streak >= 7,
            AchievementId::MonthStreak => stats.best_streak >= 30,
            AchievementId::FirstExercise => stats.exercises_completed >= 1,
            AchievementId::TwentyFiveExercises => stats.exercises_completed >= 25,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstBreak => "First Break",
            AchievementId::TenBreaks => "Getting the Habit",
            AchievementId::FiftyBreaks => "Rested Eyes",
            AchievementId::HundredBreaks => "Century",
            AchievementId::FiveHundredBreaks => "Eye Care Veteran",
            AchievementId::ThreeDayStreak => "Three in a Row",
            AchievementId::WeekStreak => "Week Streak",
            AchievementId::MonthStreak => "Month Streak",
            AchievementId::FirstExercise => "First Exercise",
            AchievementId::TwentyFiveExercises => "Exercise Regular",
        }
    }
}

/// Unlocked achievement ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Achievements {
    unlocked: BTreeSet<AchievementId>,
}

impl Achievements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: AchievementId) -> bool {
        self.unlocked.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.unlocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AchievementId> + '_ {
        self.unlocked.iter().copied()
    }

    /// Add every id unlocked in `other`. Returns whether the set grew.
    pub fn merge(&mut self, other: &Achievements) -> bool {
        let before = self.unlocked.len();
        self.unlocked.extend(other.iter());
        self.unlocked.len() != before
    }

    /// Ids whose threshold is met but which are not yet unlocked.
    pub fn evaluate(&self, stats: &Statistics) -> Vec<AchievementId> {
        AchievementId::ALL
            .into_iter()
            .filter(|id| !self.contains(*id))
            .filter(|id| id.is_met(stats))
            .collect()
    }

    /// Evaluate and add newly met ids; one event per new unlock.
    pub fn unlock_new(&mut self, stats: &Statistics, now: i64) -> Vec<Event> {
        let newly = self.evaluate(stats);
        newly
            .into_iter()
            .map(|id| {
                self.unlocked.insert(id);
                tracing::info!(achievement = ?id, "achievement unlocked");
                Event::AchievementUnlocked {
                    id,
                    title: id.title().to_string(),
                    at: to_datetime(now),
                }
            })
            .collect()
    }
}
