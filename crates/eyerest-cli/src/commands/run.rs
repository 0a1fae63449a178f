//! Foreground scheduler: ticks the timer on a fixed cadence and prints
//! every event as a JSON line until interrupted.

use std::time::Duration;

use clap::Args;
use eyerest_core::{Config, Event, EyeRest};
use tokio::sync::broadcast::error::RecvError;

use super::{print_events, CmdResult};

#[derive(Args)]
pub struct RunArgs {
    /// Seconds between ticks (defaults to scheduler.tick_secs)
    #[arg(long)]
    every: Option<u64>,
    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,
    /// Start the next cycle as soon as a break is due
    #[arg(long)]
    auto_next: bool,
}

pub async fn run(args: RunArgs) -> CmdResult {
    let config = Config::load()?;
    let svc = EyeRest::from_config(&config)?;
    let every = Duration::from_secs(args.every.unwrap_or(config.scheduler.tick_secs).max(1));

    let mut bus = svc.subscribe();
    print_events(&svc.start()?)?;
    if svc.start_sync() {
        tracing::info!("following remote changes");
    }
    tracing::info!(every_secs = every.as_secs(), "scheduler running");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interval = tokio::time::interval(every);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // A failed tick is retried on the next one; the scheduler keeps going.
                match svc.tick() {
                    Ok(events) => {
                        print_events(&events)?;
                        if args.auto_next && events.iter().any(|e| matches!(e, Event::BreakDue { .. })) {
                            match svc.start_next() {
                                Ok(events) => print_events(&events)?,
                                Err(e) => tracing::warn!(error = %e, "failed to start next cycle"),
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "tick failed"),
                }
                ticks += 1;
                if args.ticks.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
            received = bus.recv() => match received {
                Ok(event @ Event::RemoteApplied { .. }) => print_events(&[event])?,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    svc.flush().await;
    Ok(())
}
