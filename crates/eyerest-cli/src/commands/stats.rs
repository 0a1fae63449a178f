use clap::Subcommand;
use eyerest_core::stats::AVERAGE_WINDOW_DAYS;
use serde::Serialize;

use super::{open_service, print_events, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's counters against the daily goal
    Today,
    /// All-time statistics
    All,
    /// Breaks per day, newest first
    History {
        /// Number of days to show
        #[arg(long, default_value_t = AVERAGE_WINDOW_DAYS)]
        days: usize,
    },
    /// Record a break taken outside the timer
    RecordBreak,
    /// Record a completed eye exercise
    RecordExercise,
}

#[derive(Serialize)]
struct Today {
    breaks_today: u32,
    daily_goal: u32,
    exercises_today: u32,
    current_streak: u32,
    average_breaks_per_day: f64,
}

#[derive(Serialize)]
struct HistoryRow {
    date: chrono::NaiveDate,
    breaks: u32,
}

pub async fn run(action: StatsAction) -> CmdResult {
    let svc = open_service()?;

    match action {
        StatsAction::Today => {
            let snap = svc.snapshot()?;
            print_json(&Today {
                breaks_today: snap.breaks_today,
                daily_goal: snap.daily_goal,
                exercises_today: snap.exercises_today,
                current_streak: snap.current_streak,
                average_breaks_per_day: snap.average_breaks_per_day,
            })?;
        }
        StatsAction::All => {
            print_json(&svc.statistics()?)?;
        }
        StatsAction::History { days } => {
            let stats = svc.statistics()?;
            let rows: Vec<HistoryRow> = stats
                .daily_history
                .recent(days)
                .map(|(date, breaks)| HistoryRow { date, breaks })
                .collect();
            print_json(&rows)?;
        }
        StatsAction::RecordBreak => {
            let events = svc.record_break_completed()?;
            if events.is_empty() {
                eprintln!("break already recorded in the last 30 seconds");
            }
            print_events(&events)?;
        }
        StatsAction::RecordExercise => {
            let events = svc.record_exercise_completed()?;
            if events.is_empty() {
                eprintln!("exercise already recorded in the last 30 seconds");
            }
            print_events(&events)?;
        }
    }

    svc.flush().await;
    Ok(())
}
