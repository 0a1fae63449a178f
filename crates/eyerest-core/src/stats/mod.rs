//! Usage statistics: break and exercise counters, streaks, daily history.

mod history;
mod tracker;

pub use history::{DailyHistory, HISTORY_LIMIT};
pub use tracker::{Statistics, AVERAGE_WINDOW_DAYS};
