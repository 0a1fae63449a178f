//! # EyeRest Core Library
//!
//! Core logic for the EyeRest break reminder, which follows the 20-20-20 rule:
//! every 20 minutes, look at something 20 feet away for 20 seconds. All
//! operations are available through the [`EyeRest`] service, which the CLI
//! binary drives on a schedule.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-based state machine; the caller invokes
//!   `tick()` periodically and the timer derives remaining time from
//!   persisted timestamps
//! - **Statistics**: break and exercise counters, daily rollover, streaks
//!   and a bounded daily history
//! - **Achievements**: fixed thresholds over the statistics, union-only
//! - **Storage**: SQLite-backed preference store and TOML configuration
//! - **Sync**: category documents mirrored to a remote store, last write wins
//!
//! ## Key Components
//!
//! - [`EyeRest`]: Service facade and the tick chain
//! - [`TimerState`]: Break timer state machine
//! - [`PreferenceStore`]: Durable key/value persistence
//! - [`SyncCoordinator`]: Push, pull and subscribe against a [`RemoteStore`]

pub mod achievements;
pub mod clock;
pub mod error;
pub mod events;
pub mod service;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod timer;

pub use achievements::{AchievementId, Achievements};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, StoreError, SyncError};
pub use events::Event;
pub use service::{EyeRest, Snapshot};
pub use settings::Settings;
pub use stats::{DailyHistory, Statistics};
pub use storage::{Config, PreferenceStore, SharedStore};
pub use sync::{
    HttpRemoteStore, MemoryRemoteStore, RemoteStore, SyncCategory, SyncCoordinator, SyncDocument,
    SyncStatus,
};
pub use timer::{TimerPhase, TimerState};
