use clap::Subcommand;

use super::{open_service, print_events, print_json, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Begin the first cycle
    Start,
    /// Advance the timer once; records a break when the cycle ends
    Tick,
    /// Freeze the remaining time
    Pause,
    /// Continue a paused cycle
    Resume,
    /// Restart the current cycle from zero
    Reset,
    /// Acknowledge a finished cycle and start the next one
    Next,
    /// Print the current snapshot as JSON
    Status,
}

pub async fn run(action: TimerAction) -> CmdResult {
    let svc = open_service()?;

    let events = match action {
        TimerAction::Start => svc.start()?,
        TimerAction::Tick => svc.tick()?,
        TimerAction::Pause => svc.pause()?,
        TimerAction::Resume => svc.resume()?,
        TimerAction::Reset => svc.reset()?,
        TimerAction::Next => svc.start_next()?,
        TimerAction::Status => {
            return print_json(&svc.snapshot()?);
        }
    };

    if events.is_empty() {
        print_json(&svc.snapshot()?)?;
    } else {
        print_events(&events)?;
    }
    svc.flush().await;
    Ok(())
}
