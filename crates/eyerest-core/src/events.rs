use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::AchievementId;
use crate::sync::SyncCategory;

/// Every state change in the system produces an Event.
/// Display collaborators poll for events or refresh on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        interval_minutes: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// The cycle ran out; a break reminder is due.
    BreakDue {
        interval_minutes: u32,
        at: DateTime<Utc>,
    },
    BreakRecorded {
        total_breaks: u32,
        breaks_today: u32,
        current_streak: u32,
        best_streak: u32,
        at: DateTime<Utc>,
    },
    ExerciseRecorded {
        exercises_completed: u32,
        exercises_today: u32,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        id: AchievementId,
        title: String,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        at: DateTime<Utc>,
    },
    /// A remote document overwrote local state.
    RemoteApplied {
        category: SyncCategory,
        at: DateTime<Utc>,
    },
}
