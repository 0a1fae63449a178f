use clap::Subcommand;
use eyerest_core::AchievementId;
use serde::Serialize;

use super::{open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// Every achievement with its unlock state
    List,
    /// Unlocked achievements only
    Unlocked,
}

#[derive(Serialize)]
struct Row {
    id: AchievementId,
    title: &'static str,
    unlocked: bool,
}

pub fn run(action: AchievementsAction) -> CmdResult {
    let svc = open_service()?;
    let unlocked = svc.achievements()?;

    let rows: Vec<Row> = AchievementId::ALL
        .into_iter()
        .map(|id| Row {
            id,
            title: id.title(),
            unlocked: unlocked.contains(id),
        })
        .filter(|row| match action {
            AchievementsAction::List => true,
            AchievementsAction::Unlocked => row.unlocked,
        })
        .collect();

    print_json(&rows)
}
