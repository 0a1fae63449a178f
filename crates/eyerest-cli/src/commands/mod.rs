pub mod achievements;
pub mod config;
pub mod run;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod timer;

use eyerest_core::{Config, Event, EyeRest};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the service from the on-disk configuration.
pub fn open_service() -> Result<EyeRest, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(EyeRest::from_config(&config)?)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One compact JSON line per event.
pub fn print_events(events: &[Event]) -> CmdResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
